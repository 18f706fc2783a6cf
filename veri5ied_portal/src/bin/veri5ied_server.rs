use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::signal;

use veri5ied_portal::api::{create_router, AppState};
use veri5ied_portal::Config;

/// Veri5ied verification portal API server
#[derive(Parser)]
#[clap(name = "veri5ied-server")]
#[clap(about = "Veri5ied product verification API backed by Kaleido")]
struct Args {
    /// Optional YAML configuration file
    #[clap(long, env = "VERI5IED_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configuration
    #[clap(long)]
    port: Option<u16>,

    /// Address to bind
    #[clap(long, default_value = "0.0.0.0")]
    host: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref());

    let state = AppState::from_config(&config)?;
    if !state.configured {
        warn!("Starting with incomplete Kaleido configuration");
    }

    let port = args.port.unwrap_or(config.server.port);
    let address = format!("{}:{}", args.host, port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Veri5ied API listening on {address}");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install terminate handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

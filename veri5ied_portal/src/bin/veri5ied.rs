use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;

use veri5ied_portal::ledger::{KaleidoGateway, ProductLedger};
use veri5ied_portal::storage::{ImageStore, IpfsClient};
use veri5ied_portal::workflow::{
    verify_batch, BatchStatus, Completion, Confirmation, DraftImage, LineSource, ScanSession,
    SubmissionDraft, SubmissionWorkflow, VerificationState, VerificationWorkflow,
};
use veri5ied_portal::{Config, VerifiedProduct};

#[derive(Parser)]
#[command(name = "veri5ied", version, about = "Verify and register pharmaceutical products on Kaleido")]
struct Cli {
    /// Optional YAML configuration file
    #[arg(long, env = "VERI5IED_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Verify one product by batch number or product ID
    Verify { identifier: String },
    /// Verify several products at once
    VerifyBatch {
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Read one code from a keyboard-wedge scanner on stdin and verify it
    Scan {
        /// Give up after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
    },
    /// Register a product on the ledger
    Add {
        /// Leave out to have a short product ID generated
        #[arg(long, default_value = "")]
        batch_number: String,
        #[arg(long)]
        name: String,
        /// YYYY-MM-DD
        #[arg(long)]
        manufacturing_date: String,
        /// YYYY-MM-DD
        #[arg(long)]
        expiry_date: String,
        #[arg(long)]
        nafdac_number: String,
        /// Product image to upload to IPFS
        #[arg(long)]
        image: Option<PathBuf>,
        /// Name recorded as the producer
        #[arg(long, env = "VERI5IED_PRODUCER")]
        producer: String,
    },
    /// Print the download URL of an IPFS content hash
    ImageUrl { hash: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref());

    let ledger: Arc<dyn ProductLedger> = Arc::new(KaleidoGateway::new(&config.gateway)?);
    let images: Arc<dyn ImageStore> = Arc::new(IpfsClient::new(&config.ipfs)?);

    match cli.command {
        Commands::Verify { identifier } => {
            let workflow = VerificationWorkflow::new(ledger, images);
            let completion = workflow.verify(&identifier).await?;
            Ok(exit_code(report_verification(completion, cli.json)?))
        }
        Commands::VerifyBatch { identifiers } => {
            let report = verify_batch(ledger.as_ref(), images.as_ref(), &identifiers).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for entry in &report.entries {
                    match &entry.status {
                        BatchStatus::Verified { product } => {
                            println!("{}: verified ({})", entry.identifier, product.product.product_name)
                        }
                        BatchStatus::NotFound { .. } => println!("{}: not found", entry.identifier),
                        BatchStatus::Failed { message } => println!("{}: {message}", entry.identifier),
                        BatchStatus::Skipped => {}
                    }
                }
                println!("{}", report.summary());
            }
            Ok(exit_code(report.verified == report.total))
        }
        Commands::Scan { timeout } => {
            let workflow = Arc::new(VerificationWorkflow::new(ledger, images));
            let session = ScanSession::start(LineSource::new(BufReader::new(tokio::io::stdin())));
            eprintln!("Waiting for a scanned code...");

            if let Some(seconds) = timeout {
                let workflow = workflow.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_secs(seconds)).await;
                    workflow.stop_scan();
                });
            }

            let completion = workflow.verify_scan(session).await?;
            let verified = report_verification(completion, cli.json)?;
            // A pending stdin read would keep the runtime from shutting down
            std::process::exit(if verified { 0 } else { 1 });
        }
        Commands::Add {
            batch_number,
            name,
            manufacturing_date,
            expiry_date,
            nafdac_number,
            image,
            producer,
        } => {
            let image = match image {
                Some(path) => Some(read_image(&path).await?),
                None => None,
            };
            let draft = SubmissionDraft {
                batch_number,
                product_name: name,
                manufacturing_date,
                expiry_date,
                nafdac_number,
                image,
            };

            let workflow = SubmissionWorkflow::new(ledger, images)
                .with_confirmation(config.server.confirm_submissions);
            let receipt = workflow.submit(&draft, Some(&producer)).await?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&receipt)?);
            } else {
                println!("Product added successfully, Product ID: {}", receipt.identifier);
                println!("Image: {}", receipt.image_url);
                match &receipt.confirmation {
                    Confirmation::NotYetVisible { message } | Confirmation::Unconfirmed { message } => {
                        eprintln!("Warning: {message}")
                    }
                    Confirmation::Confirmed | Confirmation::Skipped => {}
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::ImageUrl { hash } => {
            println!("{}", images.image_url(&hash));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn read_image(path: &Path) -> Result<DraftImage> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "product-image".to_string());
    Ok(DraftImage { bytes, file_name })
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Print a verification outcome; true when the product was found
fn report_verification(completion: Completion, json: bool) -> Result<bool> {
    let state = match completion {
        Completion::Applied(state) => state,
        Completion::Superseded | Completion::Cancelled => {
            eprintln!("No product was verified");
            return Ok(false);
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    }

    match state {
        VerificationState::Found { product } => {
            if !json {
                print_product(&product);
            }
            Ok(true)
        }
        VerificationState::NotFound { message, .. } | VerificationState::Failed { message, .. } => {
            if !json {
                eprintln!("{message}");
            }
            Ok(false)
        }
        VerificationState::Idle | VerificationState::Verifying { .. } => Ok(false),
    }
}

fn print_product(verified: &VerifiedProduct) {
    let product = &verified.product;
    println!("Product verified");
    println!("  Product ID:         {}", product.batch_number);
    println!("  Name:               {}", product.product_name);
    println!("  Manufacturing date: {}", product.manufacturing_date);
    println!("  Expiry date:        {}", product.expiry_date);
    println!("  NAFDAC number:      {}", product.nafdac_number);
    if let Some(producer) = &product.producer {
        println!("  Producer:           {producer}");
    }
    println!("  Image:              {}", verified.image_url);
}

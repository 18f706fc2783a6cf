use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderName, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

use super::auth::IDENTITY_HEADER;
use super::handlers::{health, images, products, verify};
use crate::config::Config;
use crate::ledger::{KaleidoGateway, ProductLedger};
use crate::storage::{ImageStore, IpfsClient};
use crate::workflow::SubmissionWorkflow;

/// Largest accepted product form, image included
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn ProductLedger>,
    pub images: Arc<dyn ImageStore>,
    pub submissions: Arc<SubmissionWorkflow>,
    /// Whether every Kaleido setting was present at startup
    pub configured: bool,
}

impl AppState {
    pub fn new(
        ledger: Arc<dyn ProductLedger>,
        images: Arc<dyn ImageStore>,
        confirm_submissions: bool,
    ) -> Self {
        let submissions = SubmissionWorkflow::new(ledger.clone(), images.clone())
            .with_confirmation(confirm_submissions);
        Self {
            ledger,
            images,
            submissions: Arc::new(submissions),
            configured: true,
        }
    }

    /// Build the Kaleido gateway and IPFS clients from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let ledger = Arc::new(KaleidoGateway::new(&config.gateway)?);
        let images = Arc::new(IpfsClient::new(&config.ipfs)?);

        let mut state = Self::new(ledger, images, config.server.confirm_submissions);
        state.configured = config.is_complete();
        Ok(state)
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(IDENTITY_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/verify", post(verify::verify_product))
        .route("/api/verify/scan", post(verify::verify_scanned))
        .route("/api/verify/batch", post(verify::verify_products))
        .route("/api/products", post(products::add_product))
        .route("/api/products/:id", get(products::get_product))
        .route("/api/images/:hash", get(images::image_url))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

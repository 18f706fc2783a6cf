//! Product verification.
//!
//! `Idle -> Verifying -> {Found, NotFound, Failed}`, re-entered on every new
//! request. Each request takes a token from a monotonically increasing counter
//! and its result is applied only if that token is still the latest when the
//! gateway answers, so a slow early request can never overwrite a later one.
//! Closing the workflow discards anything still in flight.

use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::scanner::{identifier_from_scan, ScanSession};
use crate::common::{GatewayError, ValidationError};
use crate::ledger::ProductLedger;
use crate::storage::ImageStore;
use crate::types::VerifiedProduct;

pub const NOT_FOUND_MESSAGE: &str =
    "This product is not found in our records or is not authentic. Please check the ID and try again.";

pub const EMPTY_IDENTIFIER_MESSAGE: &str = "Please enter a valid Product ID.";

/// Outcome of one lookup
#[derive(Debug)]
pub enum VerificationResult {
    Found(VerifiedProduct),
    NotFound,
    Error(GatewayError),
}

/// Look `identifier` up and resolve the image of whatever is found
pub async fn lookup_product(
    ledger: &dyn ProductLedger,
    images: &dyn ImageStore,
    identifier: &str,
) -> VerificationResult {
    match ledger.fetch_product(identifier).await {
        Ok(Some(product)) => {
            let image_url = images.image_url(&product.product_image);
            VerificationResult::Found(VerifiedProduct { product, image_url })
        }
        Ok(None) => VerificationResult::NotFound,
        Err(e) => VerificationResult::Error(e),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum VerificationState {
    Idle,
    Verifying { identifier: String },
    Found { product: VerifiedProduct },
    NotFound { identifier: String, message: String },
    Failed { identifier: String, message: String },
}

impl VerificationState {
    pub fn from_result(identifier: &str, result: VerificationResult) -> Self {
        match result {
            VerificationResult::Found(product) => VerificationState::Found { product },
            VerificationResult::NotFound => VerificationState::NotFound {
                identifier: identifier.to_string(),
                message: NOT_FOUND_MESSAGE.to_string(),
            },
            VerificationResult::Error(e) => VerificationState::Failed {
                identifier: identifier.to_string(),
                message: format!("Failed to verify product: {e}"),
            },
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, VerificationState::Idle | VerificationState::Verifying { .. })
    }
}

/// What happened to a request once the gateway answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The result became the current state
    Applied(VerificationState),
    /// A later request was issued meanwhile; the result was dropped
    Superseded,
    /// The workflow was closed or the scan ended without a code
    Cancelled,
}

struct Inner {
    latest: u64,
    closed: bool,
    scans_started: u64,
    /// Active scan, tagged with the number it was started under
    scan: Option<(u64, CancellationToken)>,
}

pub struct VerificationWorkflow {
    ledger: Arc<dyn ProductLedger>,
    images: Arc<dyn ImageStore>,
    inner: Mutex<Inner>,
    state: watch::Sender<VerificationState>,
}

impl VerificationWorkflow {
    pub fn new(ledger: Arc<dyn ProductLedger>, images: Arc<dyn ImageStore>) -> Self {
        let (state, _) = watch::channel(VerificationState::Idle);
        Self {
            ledger,
            images,
            inner: Mutex::new(Inner {
                latest: 0,
                closed: false,
                scans_started: 0,
                scan: None,
            }),
            state,
        }
    }

    pub fn state(&self) -> VerificationState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<VerificationState> {
        self.state.subscribe()
    }

    /// Verify a typed or scanned identifier. An empty identifier is rejected
    /// without touching the network and leaves the state as it was.
    pub async fn verify(&self, identifier: &str) -> Result<Completion, ValidationError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ValidationError::new("identifier", EMPTY_IDENTIFIER_MESSAGE));
        }

        let token = {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Ok(Completion::Cancelled);
            }
            inner.latest += 1;
            self.state.send_replace(VerificationState::Verifying {
                identifier: identifier.to_string(),
            });
            inner.latest
        };

        info!("Verifying product {identifier} (request {token})");
        let result = lookup_product(self.ledger.as_ref(), self.images.as_ref(), identifier).await;
        let next = VerificationState::from_result(identifier, result);

        let inner = self.inner.lock();
        if inner.closed {
            debug!("Discarding result of request {token}: workflow closed");
            return Ok(Completion::Cancelled);
        }
        if inner.latest != token {
            debug!("Discarding result of request {token}: superseded by {}", inner.latest);
            return Ok(Completion::Superseded);
        }

        if let VerificationState::Failed { message, .. } = &next {
            warn!("{message}");
        }
        self.state.send_replace(next.clone());
        Ok(Completion::Applied(next))
    }

    /// Wait for the session's single decoded code and verify it exactly as a
    /// typed identifier. The session has already released its source by the
    /// time verification starts.
    pub async fn verify_scan(&self, mut session: ScanSession) -> Result<Completion, ValidationError> {
        let scan_id = {
            let mut inner = self.inner.lock();
            if inner.closed {
                session.stop();
                return Ok(Completion::Cancelled);
            }
            inner.scans_started += 1;
            let scan_id = inner.scans_started;
            if let Some((_, previous)) = inner.scan.replace((scan_id, session.cancel_token())) {
                previous.cancel();
            }
            scan_id
        };

        let decoded = session.decoded().await;
        {
            // A scan that replaced this one owns the slot now
            let mut inner = self.inner.lock();
            if matches!(inner.scan, Some((id, _)) if id == scan_id) {
                inner.scan = None;
            }
        }

        let Some(payload) = decoded else {
            return Ok(Completion::Cancelled);
        };

        match identifier_from_scan(&payload) {
            Some(identifier) => self.verify(&identifier).await,
            None => Err(ValidationError::new(
                "identifier",
                "Scanned code does not contain a product ID.",
            )),
        }
    }

    /// Stop any active scan without verifying
    pub fn stop_scan(&self) {
        if let Some((_, scan)) = self.inner.lock().scan.take() {
            scan.cancel();
        }
    }

    /// Tear the workflow down: stop scanning and drop every in-flight result
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        if let Some((_, scan)) = inner.scan.take() {
            scan.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }
}

//! Verify several identifiers at once and report per-entry outcomes.

use futures::stream::{self, StreamExt};
use log::info;
use serde::Serialize;

use super::verification::{lookup_product, VerificationResult, NOT_FOUND_MESSAGE};
use crate::ledger::ProductLedger;
use crate::storage::ImageStore;
use crate::types::VerifiedProduct;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Verified { product: VerifiedProduct },
    NotFound { message: String },
    Failed { message: String },
    /// Blank entry, never sent to the gateway
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub identifier: String,
    #[serde(flatten)]
    pub status: BatchStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub entries: Vec<BatchEntry>,
    pub verified: usize,
    pub total: usize,
}

impl BatchReport {
    pub fn summary(&self) -> String {
        format!("{} out of {} products verified", self.verified, self.total)
    }
}

/// Largest batch the HTTP API accepts in one request
pub const MAX_BATCH_SIZE: usize = 100;

/// Lookups in flight at once
pub const BATCH_CONCURRENCY: usize = 8;

/// Look every identifier up, at most `BATCH_CONCURRENCY` at a time. Entries
/// keep their input order; blank ones are skipped and do not count toward
/// `total`.
pub async fn verify_batch(
    ledger: &dyn ProductLedger,
    images: &dyn ImageStore,
    identifiers: &[String],
) -> BatchReport {
    let lookups = identifiers.iter().map(move |raw| async move {
        let identifier = raw.trim().to_string();
        if identifier.is_empty() {
            return BatchEntry {
                identifier,
                status: BatchStatus::Skipped,
            };
        }

        let status = match lookup_product(ledger, images, &identifier).await {
            VerificationResult::Found(product) => BatchStatus::Verified { product },
            VerificationResult::NotFound => BatchStatus::NotFound {
                message: NOT_FOUND_MESSAGE.to_string(),
            },
            VerificationResult::Error(e) => BatchStatus::Failed {
                message: format!("Failed to verify product: {e}"),
            },
        };
        BatchEntry { identifier, status }
    });
    let lookups: Vec<_> = lookups.collect();

    let entries: Vec<BatchEntry> = stream::iter(lookups)
        .buffered(BATCH_CONCURRENCY)
        .collect()
        .await;
    let total = entries
        .iter()
        .filter(|e| e.status != BatchStatus::Skipped)
        .count();
    let verified = entries
        .iter()
        .filter(|e| matches!(e.status, BatchStatus::Verified { .. }))
        .count();

    let report = BatchReport {
        entries,
        verified,
        total,
    };
    info!("Batch verification: {}", report.summary());
    report
}

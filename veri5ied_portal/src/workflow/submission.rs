//! Product submission: validate, upload the image, record on the ledger and
//! optionally read the record back.
//!
//! Every failure leaves the [`SubmissionDraft`] untouched; the workflow only
//! ever borrows it.

use chrono::{NaiveDate, Utc};
use log::{debug, error, info, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::common::{SubmissionError, ValidationErrors};
use crate::ledger::ProductLedger;
use crate::storage::ImageStore;
use crate::types::{parse_calendar_date, ImageUrl, Product};

const PRODUCT_ID_PREFIX: &str = "PRD-";
const PRODUCT_ID_LEN: usize = 8;
const PRODUCT_ID_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

const MIN_NAME_LEN: usize = 2;

pub const NOT_YET_VISIBLE_MESSAGE: &str =
    "Product was submitted but is not visible on the ledger yet. Try verifying it again shortly.";

/// Image attached to a draft
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftImage {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Product details as entered by the producer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubmissionDraft {
    /// Optional; a short product ID is generated when blank
    pub batch_number: String,
    pub product_name: String,
    pub manufacturing_date: String,
    pub expiry_date: String,
    pub nafdac_number: String,
    #[serde(skip)]
    pub image: Option<DraftImage>,
}

/// Fields of a draft that passed validation
struct ValidDraft {
    manufacturing_date: NaiveDate,
    expiry_date: NaiveDate,
}

impl SubmissionDraft {
    /// Check every field and report all problems at once
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        self.check().map(|_| ())
    }

    fn check(&self) -> Result<ValidDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.product_name.trim().chars().count() < MIN_NAME_LEN {
            errors.add("productName", "Product name must be at least 2 characters.");
        }
        if self.nafdac_number.trim().is_empty() {
            errors.add("nafdacNumber", "NAFDAC number is required.");
        }

        let manufacturing_date = required_date(
            &mut errors,
            "manufacturingDate",
            &self.manufacturing_date,
            "Manufacturing date is required.",
        );
        let expiry_date = required_date(
            &mut errors,
            "expiryDate",
            &self.expiry_date,
            "Expiry date is required.",
        );

        if let (Some(made), Some(expires)) = (manufacturing_date, expiry_date) {
            if expires < made {
                errors.add("expiryDate", "Expiry date cannot be before the manufacturing date.");
            }
        }

        match (manufacturing_date, expiry_date) {
            (Some(manufacturing_date), Some(expiry_date)) if errors.is_empty() => Ok(ValidDraft {
                manufacturing_date,
                expiry_date,
            }),
            _ => Err(errors),
        }
    }
}

fn required_date(
    errors: &mut ValidationErrors,
    field: &str,
    raw: &str,
    missing: &str,
) -> Option<NaiveDate> {
    if raw.trim().is_empty() {
        errors.add(field, missing);
        return None;
    }
    let parsed = parse_calendar_date(raw);
    if parsed.is_none() {
        errors.add(field, "Date must be in YYYY-MM-DD format.");
    }
    parsed
}

/// Short product ID used when the producer leaves the batch number blank
pub fn generate_short_product_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..PRODUCT_ID_LEN)
        .map(|_| PRODUCT_ID_CHARSET[rng.gen_range(0..PRODUCT_ID_CHARSET.len())] as char)
        .collect();
    format!("{PRODUCT_ID_PREFIX}{suffix}")
}

/// Result of reading a fresh submission back from the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Confirmation {
    Confirmed,
    /// Read-after-write lag; the write itself succeeded
    NotYetVisible { message: String },
    /// The read-back call failed; the write itself succeeded
    Unconfirmed { message: String },
    /// Read-back is disabled
    Skipped,
}

impl Confirmation {
    /// Whether the submission should be reported with a soft warning
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Confirmation::NotYetVisible { .. } | Confirmation::Unconfirmed { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub identifier: String,
    pub product: Product,
    pub image_url: ImageUrl,
    pub confirmation: Confirmation,
}

pub struct SubmissionWorkflow {
    ledger: Arc<dyn ProductLedger>,
    images: Arc<dyn ImageStore>,
    confirm: bool,
}

impl SubmissionWorkflow {
    pub fn new(ledger: Arc<dyn ProductLedger>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            ledger,
            images,
            confirm: true,
        }
    }

    /// Turn the post-submit read-back on or off
    pub fn with_confirmation(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }

    pub async fn submit(
        &self,
        draft: &SubmissionDraft,
        producer: Option<&str>,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let valid = draft.check()?;

        let product_image = match &draft.image {
            Some(image) => {
                let hash = self
                    .images
                    .upload_image(image.bytes.clone(), &image.file_name)
                    .await
                    .map_err(|e| {
                        error!("Image upload failed, product not submitted: {e}");
                        e
                    })?;
                debug!("Image {} stored as {hash}", image.file_name);
                hash.0
            }
            None => String::new(),
        };

        let batch_number = match draft.batch_number.trim() {
            "" => generate_short_product_id(),
            given => given.to_string(),
        };

        let product = Product {
            batch_number,
            product_name: draft.product_name.trim().to_string(),
            manufacturing_date: valid.manufacturing_date,
            expiry_date: valid.expiry_date,
            nafdac_number: draft.nafdac_number.trim().to_string(),
            product_image,
            producer: producer
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            timestamp: Some(Utc::now()),
        };

        let identifier = self.ledger.submit_product(&product).await.map_err(|e| {
            error!("Failed to add product {}: {e}", product.batch_number);
            e
        })?;
        info!("Product added, ID: {identifier}");

        let confirmation = if self.confirm {
            self.confirm_visible(&identifier).await
        } else {
            Confirmation::Skipped
        };

        Ok(SubmissionReceipt {
            image_url: self.images.image_url(&product.product_image),
            identifier,
            product,
            confirmation,
        })
    }

    async fn confirm_visible(&self, identifier: &str) -> Confirmation {
        match self.ledger.fetch_product(identifier).await {
            Ok(Some(_)) => Confirmation::Confirmed,
            Ok(None) => {
                warn!("Product {identifier} not visible right after submission");
                Confirmation::NotYetVisible {
                    message: NOT_YET_VISIBLE_MESSAGE.to_string(),
                }
            }
            Err(e) => {
                warn!("Could not confirm product {identifier}: {e}");
                Confirmation::Unconfirmed {
                    message: format!("Product was submitted but could not be confirmed: {e}"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::StorageError;
    use crate::ledger::MemoryLedger;
    use crate::storage::MemoryImageStore;
    use crate::workflow::verification::{lookup_product, VerificationResult};

    fn draft() -> SubmissionDraft {
        SubmissionDraft {
            batch_number: "BATCH-001".to_string(),
            product_name: "Paracetamol 500mg".to_string(),
            manufacturing_date: "2024-01-01".to_string(),
            expiry_date: "2026-01-01".to_string(),
            nafdac_number: "NAFDAC-123".to_string(),
            image: None,
        }
    }

    fn with_image(mut draft: SubmissionDraft) -> SubmissionDraft {
        draft.image = Some(DraftImage {
            bytes: vec![0x89, b'P', b'N', b'G'],
            file_name: "box.png".to_string(),
        });
        draft
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let draft = SubmissionDraft {
            product_name: "P".to_string(),
            manufacturing_date: "2024-13-01".to_string(),
            ..Default::default()
        };

        let errors = draft.validate().unwrap_err();
        assert!(errors.has_field("productName"));
        assert!(errors.has_field("manufacturingDate"));
        assert!(errors.has_field("expiryDate"));
        assert!(errors.has_field("nafdacNumber"));
        assert!(!errors.has_field("batchNumber"));
    }

    #[test]
    fn test_validate_rejects_expiry_before_manufacture() {
        let mut draft = draft();
        draft.expiry_date = "2023-12-31".to_string();
        let errors = draft.validate().unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        assert!(errors.has_field("expiryDate"));

        draft.expiry_date = draft.manufacturing_date.clone();
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_generated_product_id_shape() {
        for _ in 0..50 {
            let id = generate_short_product_id();
            assert!(id.starts_with("PRD-"));
            let suffix = &id[4..];
            assert_eq!(suffix.len(), 8);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_invalid_draft_makes_no_remote_calls() {
        let ledger = MemoryLedger::new();
        let images = MemoryImageStore::new();
        let workflow = SubmissionWorkflow::new(Arc::new(ledger.clone()), Arc::new(images.clone()));

        let mut draft = with_image(draft());
        draft.nafdac_number = " ".to_string();

        let err = workflow.submit(&draft, Some("Emzor")).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Validation(_)));
        assert_eq!(images.uploads(), 0);
        assert_eq!(ledger.submissions(), 0);
        assert_eq!(ledger.fetches(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_aborts_submission() {
        let ledger = MemoryLedger::new();
        let workflow = SubmissionWorkflow::new(
            Arc::new(ledger.clone()),
            Arc::new(MemoryImageStore::failing()),
        );
        let draft = with_image(draft());

        let err = workflow.submit(&draft, None).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Storage(StorageError::MissingHash)));
        assert_eq!(ledger.submissions(), 0);
        assert_eq!(draft, with_image(self::draft()));
    }

    #[tokio::test]
    async fn test_submit_then_verify() {
        let ledger = MemoryLedger::new();
        let images = MemoryImageStore::new();
        let workflow = SubmissionWorkflow::new(Arc::new(ledger.clone()), Arc::new(images.clone()));

        let receipt = workflow.submit(&draft(), Some(" Emzor Labs ")).await.unwrap();
        assert_eq!(receipt.identifier, "BATCH-001");
        assert_eq!(receipt.confirmation, Confirmation::Confirmed);
        assert_eq!(receipt.image_url, ImageUrl::NoImage);
        assert_eq!(receipt.product.producer.as_deref(), Some("Emzor Labs"));
        assert!(receipt.product.timestamp.is_some());

        let VerificationResult::Found(found) = lookup_product(&ledger, &images, "BATCH-001").await else {
            panic!("expected the submitted product to be found");
        };
        assert_eq!(found.product.product_name, "Paracetamol 500mg");
        assert_eq!(found.product.expiry_date, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(found.image_url, ImageUrl::NoImage);
    }

    #[tokio::test]
    async fn test_image_hash_is_recorded() {
        let ledger = MemoryLedger::new();
        let images = MemoryImageStore::new();
        let workflow = SubmissionWorkflow::new(Arc::new(ledger.clone()), Arc::new(images.clone()));

        let receipt = workflow.submit(&with_image(draft()), None).await.unwrap();
        assert_eq!(receipt.product.product_image, "bafymem000001");
        assert_eq!(images.get("bafymem000001").map(|b| b.len()), Some(4));
        assert_eq!(
            receipt.image_url.as_str(),
            Some("memory://ipfs/ipfs/bafymem000001?dl=1")
        );
    }

    #[tokio::test]
    async fn test_blank_batch_number_gets_generated_id() {
        let ledger = MemoryLedger::new();
        let workflow = SubmissionWorkflow::new(Arc::new(ledger.clone()), Arc::new(MemoryImageStore::new()));

        let mut draft = draft();
        draft.batch_number = "  ".to_string();
        let receipt = workflow.submit(&draft, None).await.unwrap();

        assert!(receipt.identifier.starts_with("PRD-"));
        assert_eq!(receipt.product.batch_number, receipt.identifier);
        assert!(ledger.fetch_product(&receipt.identifier).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_read_lag_is_a_soft_warning() {
        let ledger = MemoryLedger::with_read_lag(1);
        let workflow = SubmissionWorkflow::new(Arc::new(ledger.clone()), Arc::new(MemoryImageStore::new()));

        let receipt = workflow.submit(&draft(), None).await.unwrap();
        assert!(receipt.confirmation.is_warning());
        assert!(matches!(receipt.confirmation, Confirmation::NotYetVisible { .. }));
        assert_eq!(ledger.submissions(), 1);
    }

    #[tokio::test]
    async fn test_confirmation_can_be_disabled() {
        let ledger = MemoryLedger::new();
        let workflow = SubmissionWorkflow::new(Arc::new(ledger.clone()), Arc::new(MemoryImageStore::new()))
            .with_confirmation(false);

        let receipt = workflow.submit(&draft(), None).await.unwrap();
        assert_eq!(receipt.confirmation, Confirmation::Skipped);
        assert_eq!(ledger.fetches(), 0);
    }
}

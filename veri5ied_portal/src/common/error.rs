use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Failure of a call to the blockchain smart-contract gateway
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The gateway answered with a non-success status
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The request was sent but no response came back
    #[error("no response received from the gateway: {0}")]
    NoResponse(String),

    #[error("gateway request timed out after {0:?}")]
    Timeout(Duration),

    /// The request could not be built or sent
    #[error("gateway request failed: {0}")]
    Request(String),

    /// The gateway answered successfully but with a payload we cannot read
    #[error("unexpected gateway response: {0}")]
    UnexpectedShape(String),
}

impl GatewayError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GatewayError::Timeout(_))
    }
}

/// Failure of a call to the IPFS gateway
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IPFS returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("no response received from IPFS: {0}")]
    NoResponse(String),

    #[error("IPFS request timed out after {0:?}")]
    Timeout(Duration),

    #[error("IPFS upload returned no content hash")]
    MissingHash,

    #[error("IPFS request failed: {0}")]
    Request(String),
}

/// A single field-level problem found while validating user input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// All field-level problems of one form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub errors: Vec<ValidationError>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, field: &str, message: &str) {
        self.errors.push(ValidationError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> std::result::Result<(), ValidationErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let joined: Vec<String> = self.errors.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", joined.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl From<ValidationError> for ValidationErrors {
    fn from(err: ValidationError) -> Self {
        Self { errors: vec![err] }
    }
}

/// Why a product submission did not go through. The draft is left untouched
/// in every case so the caller can correct it and resubmit.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid product details: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("failed to upload product image: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to add product to blockchain: {0}")]
    Gateway(#[from] GatewayError),
}

pub type Result<T> = std::result::Result<T, GatewayError>;

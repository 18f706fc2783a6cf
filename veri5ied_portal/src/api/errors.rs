//! JSON error responses for the HTTP API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::common::{GatewayError, StorageError, SubmissionError, ValidationError, ValidationErrors};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub timestamp: u64,
}

impl ApiError {
    pub fn new(code: u16, message: String) -> Self {
        Self {
            code,
            message,
            details: None,
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }

    pub fn with_details(code: u16, message: String, details: serde_json::Value) -> Self {
        Self {
            code,
            message,
            details: Some(details),
            timestamp: chrono::Utc::now().timestamp() as u64,
        }
    }

    pub fn bad_request(message: &str) -> Self {
        Self::new(400, message.to_string())
    }

    /// Producer-only route hit without a signed-in identity
    pub fn sign_in_required() -> Self {
        Self::with_details(
            401,
            "Sign in to continue".to_string(),
            serde_json::json!({ "redirect": "/sign-in" }),
        )
    }

    pub fn product_not_found(identifier: &str, message: &str) -> Self {
        Self::with_details(
            404,
            message.to_string(),
            serde_json::json!({ "identifier": identifier }),
        )
    }

    pub fn bad_gateway(message: &str) -> Self {
        Self::new(502, message.to_string())
    }

    pub fn gateway_timeout(message: &str) -> Self {
        Self::new(504, message.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ValidationErrors::from(err).into()
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::with_details(
            422,
            "Validation failed".to_string(),
            serde_json::to_value(errors).unwrap_or(serde_json::Value::Null),
        )
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let message = format!("Failed to reach the blockchain gateway: {err}");
        if err.is_timeout() {
            Self::gateway_timeout(&message)
        } else {
            Self::bad_gateway(&message)
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Timeout(_) => Self::gateway_timeout(&format!("Failed to upload image: {err}")),
            _ => Self::bad_gateway(&format!("Failed to upload image: {err}")),
        }
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Validation(errors) => errors.into(),
            SubmissionError::Storage(e) => e.into(),
            SubmissionError::Gateway(e) => {
                let mut api = ApiError::from(e);
                api.message = format!("Failed to add product. {}", api.message);
                api
            }
        }
    }
}

use axum::{extract::State, response::Json};
use log::warn;
use serde::Deserialize;

use crate::api::{ApiError, ApiResult, AppState};
use crate::common::ValidationError;
use crate::workflow::batch::{verify_batch, BatchReport, MAX_BATCH_SIZE};
use crate::workflow::scanner::identifier_from_scan;
use crate::workflow::verification::{
    lookup_product, VerificationResult, VerificationState, EMPTY_IDENTIFIER_MESSAGE,
};

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    #[serde(default)]
    pub identifier: String,
}

/// Raw text decoded from a QR code
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    #[serde(default)]
    pub payload: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub identifiers: Vec<String>,
}

pub async fn verify_product(
    State(state): State<AppState>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<VerificationState>> {
    let identifier = request.identifier.trim();
    if identifier.is_empty() {
        return Err(ValidationError::new("identifier", EMPTY_IDENTIFIER_MESSAGE).into());
    }
    verify_identifier(&state, identifier).await.map(Json)
}

pub async fn verify_scanned(
    State(state): State<AppState>,
    Json(request): Json<ScanRequest>,
) -> ApiResult<Json<VerificationState>> {
    let identifier = identifier_from_scan(&request.payload).ok_or_else(|| {
        ApiError::from(ValidationError::new(
            "payload",
            "Scanned code does not contain a product ID.",
        ))
    })?;
    verify_identifier(&state, &identifier).await.map(Json)
}

pub async fn verify_products(
    State(state): State<AppState>,
    Json(request): Json<BatchRequest>,
) -> ApiResult<Json<BatchReport>> {
    if request.identifiers.iter().all(|id| id.trim().is_empty()) {
        return Err(ValidationError::new("identifiers", "Please enter at least one Product ID.").into());
    }
    if request.identifiers.len() > MAX_BATCH_SIZE {
        return Err(ValidationError::new(
            "identifiers",
            &format!("At most {MAX_BATCH_SIZE} Product IDs can be verified at once."),
        )
        .into());
    }
    let report = verify_batch(state.ledger.as_ref(), state.images.as_ref(), &request.identifiers).await;
    Ok(Json(report))
}

async fn verify_identifier(state: &AppState, identifier: &str) -> ApiResult<VerificationState> {
    match lookup_product(state.ledger.as_ref(), state.images.as_ref(), identifier).await {
        VerificationResult::Error(e) => {
            warn!("Failed to verify product {identifier}: {e}");
            Err(e.into())
        }
        result => Ok(VerificationState::from_result(identifier, result)),
    }
}

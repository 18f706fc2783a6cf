use axum::{
    extract::{multipart::Field, Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use log::{debug, info};

use crate::api::{ApiError, ApiResult, AppState, SignedInProducer};
use crate::types::VerifiedProduct;
use crate::workflow::submission::{DraftImage, SubmissionDraft, SubmissionReceipt};
use crate::workflow::verification::{lookup_product, VerificationResult, NOT_FOUND_MESSAGE};

const DEFAULT_IMAGE_NAME: &str = "product-image";

pub async fn get_product(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<Json<VerifiedProduct>> {
    match lookup_product(state.ledger.as_ref(), state.images.as_ref(), identifier.trim()).await {
        VerificationResult::Found(product) => Ok(Json(product)),
        VerificationResult::NotFound => Err(ApiError::product_not_found(&identifier, NOT_FOUND_MESSAGE)),
        VerificationResult::Error(e) => Err(e.into()),
    }
}

/// Multipart product form: text fields plus an optional `productImage` file
pub async fn add_product(
    State(state): State<AppState>,
    SignedInProducer(producer): SignedInProducer,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<SubmissionReceipt>)> {
    let mut draft = SubmissionDraft::default();

    while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "productImage" | "image" => {
                if let Some(image) = read_image(field).await? {
                    draft.image = Some(image);
                }
            }
            _ => {
                let value = field.text().await.map_err(invalid_form)?;
                match name.as_str() {
                    "batchNumber" | "productID" | "productId" => draft.batch_number = value,
                    "productName" | "name" => draft.product_name = value,
                    "manufacturingDate" | "productionDate" => draft.manufacturing_date = value,
                    "expiryDate" => draft.expiry_date = value,
                    "nafdacNumber" => draft.nafdac_number = value,
                    other => debug!("Ignoring form field {other:?}"),
                }
            }
        }
    }

    info!("Product submission from {producer}");
    let receipt = state.submissions.submit(&draft, Some(&producer)).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

async fn read_image(field: Field<'_>) -> ApiResult<Option<DraftImage>> {
    let file_name = field
        .file_name()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or(DEFAULT_IMAGE_NAME)
        .to_string();
    let bytes = field.bytes().await.map_err(invalid_form)?;
    if bytes.is_empty() {
        return Ok(None);
    }
    Ok(Some(DraftImage {
        bytes: bytes.to_vec(),
        file_name,
    }))
}

fn invalid_form(err: impl std::fmt::Display) -> ApiError {
    ApiError::bad_request(&format!("Invalid form data: {err}"))
}

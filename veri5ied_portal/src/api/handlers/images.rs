use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;

use crate::api::AppState;
use crate::types::ImageUrl;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub hash: String,
    pub image_url: ImageUrl,
}

/// Resolve a content hash to its download URL without fetching the image
pub async fn image_url(State(state): State<AppState>, Path(hash): Path<String>) -> Json<ImageResponse> {
    let image_url = state.images.image_url(&hash);
    Json(ImageResponse { hash, image_url })
}

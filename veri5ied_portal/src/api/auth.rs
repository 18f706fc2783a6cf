//! Signed-in gate for producer-only routes.
//!
//! Authentication happens upstream: the identity proxy in front of the portal
//! sets [`IDENTITY_HEADER`] to the signed-in user's display name. Its presence
//! is the gate and its value becomes the product's producer.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use super::ApiError;

pub const IDENTITY_HEADER: &str = "x-authenticated-user";

/// Display name of the signed-in producer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInProducer(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for SignedInProducer
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| SignedInProducer(name.to_string()))
            .ok_or_else(ApiError::sign_in_required)
    }
}

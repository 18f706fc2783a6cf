//! HTTP JSON API over the verification and submission workflows.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod server;

pub use auth::{SignedInProducer, IDENTITY_HEADER};
pub use errors::{ApiError, ApiResult};
pub use server::{create_router, AppState};

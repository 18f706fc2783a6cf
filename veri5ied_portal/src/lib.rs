//! Veri5ied pharmaceutical product verification.
//!
//! Products are recorded on a smart contract behind a Kaleido REST gateway and
//! their images on a Kaleido IPFS node. This crate provides the clients for both
//! services, the verification, batch verification, scanning and submission
//! workflows built on them, and an HTTP API exposing those workflows.

pub mod api;
pub mod common;
pub mod config;
pub mod ledger;
pub mod storage;
pub mod types;
pub mod workflow;

pub use config::Config;
pub use types::{ContentHash, ImageUrl, Product, VerifiedProduct};

//! Access to the product registry smart contract.

pub mod kaleido;
pub mod memory;

use async_trait::async_trait;

use crate::common::Result;
use crate::types::Product;

pub use kaleido::{decode_product_output, KaleidoGateway, GATEWAY_TIMEOUT};
pub use memory::MemoryLedger;

/// Read/write access to the on-chain product registry
#[async_trait]
pub trait ProductLedger: Send + Sync {
    /// Record a product and return its identifier. Not idempotent: submitting
    /// the same batch number twice is resolved by the contract, not here.
    ///
    /// The registry stores batch number, name, both dates, NAFDAC number and
    /// image hash. `producer` and `timestamp` stay local to the caller and
    /// come back as `None` from the on-chain ledger.
    async fn submit_product(&self, product: &Product) -> Result<String>;

    /// Look a product up by identifier. `Ok(None)` when the registry has no
    /// entry for it.
    async fn fetch_product(&self, identifier: &str) -> Result<Option<Product>>;
}

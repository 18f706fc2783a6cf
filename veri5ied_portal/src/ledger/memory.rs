use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::ProductLedger;
use crate::common::Result;
use crate::types::Product;

#[derive(Default)]
struct LedgerState {
    products: HashMap<String, Product>,
    /// Reads still to be answered with "not found" per freshly written identifier
    pending_visibility: HashMap<String, usize>,
    submissions: usize,
    fetches: usize,
}

/// In-memory product registry for tests and local runs.
///
/// `with_read_lag(n)` hides each newly written product from the next `n`
/// reads of its identifier, reproducing the read-after-write lag of the real
/// ledger.
#[derive(Clone, Default)]
pub struct MemoryLedger {
    state: Arc<Mutex<LedgerState>>,
    read_lag: usize,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_lag(read_lag: usize) -> Self {
        Self {
            state: Arc::default(),
            read_lag,
        }
    }

    /// Store a product directly, visible immediately
    pub fn insert(&self, product: Product) {
        let mut state = self.state.lock();
        state.products.insert(product.batch_number.clone(), product);
    }

    pub fn len(&self) -> usize {
        self.state.lock().products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    pub fn fetches(&self) -> usize {
        self.state.lock().fetches
    }
}

#[async_trait]
impl ProductLedger for MemoryLedger {
    async fn submit_product(&self, product: &Product) -> Result<String> {
        let mut state = self.state.lock();
        state.submissions += 1;
        if self.read_lag > 0 {
            state
                .pending_visibility
                .insert(product.batch_number.clone(), self.read_lag);
        }
        state
            .products
            .insert(product.batch_number.clone(), product.clone());
        Ok(product.batch_number.clone())
    }

    async fn fetch_product(&self, identifier: &str) -> Result<Option<Product>> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        state.fetches += 1;

        if let Some(remaining) = state.pending_visibility.get_mut(identifier) {
            *remaining -= 1;
            if *remaining == 0 {
                state.pending_visibility.remove(identifier);
            }
            return Ok(None);
        }

        Ok(state.products.get(identifier).cloned())
    }
}

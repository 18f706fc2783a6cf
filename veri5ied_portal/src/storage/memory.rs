use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use super::{ipfs_image_url, ImageStore, Result};
use crate::common::StorageError;
use crate::types::{ContentHash, ImageUrl};

/// In-memory image store for tests and local runs
#[derive(Clone, Default)]
pub struct MemoryImageStore {
    images: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing: bool,
}

impl MemoryImageStore {
    pub const BASE_URL: &'static str = "memory://ipfs";

    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose uploads always come back without a content hash
    pub fn failing() -> Self {
        Self {
            images: Arc::default(),
            failing: true,
        }
    }

    pub fn get(&self, hash: &str) -> Option<Vec<u8>> {
        self.images.lock().get(hash).cloned()
    }

    pub fn uploads(&self) -> usize {
        self.images.lock().len()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn upload_image(&self, bytes: Vec<u8>, _file_name: &str) -> Result<ContentHash> {
        if self.failing {
            return Err(StorageError::MissingHash);
        }
        let mut images = self.images.lock();
        let hash = format!("bafymem{:06}", images.len() + 1);
        images.insert(hash.clone(), bytes);
        Ok(ContentHash::new(hash))
    }

    fn image_url(&self, hash: &str) -> ImageUrl {
        ipfs_image_url(Self::BASE_URL, hash)
    }
}

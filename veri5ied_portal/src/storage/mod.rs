//! Product image storage on IPFS.

pub mod ipfs;
pub mod memory;

use async_trait::async_trait;

use crate::common::StorageError;
use crate::types::{ContentHash, ImageUrl};

pub use ipfs::IpfsClient;
pub use memory::MemoryImageStore;

pub type Result<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload image bytes and return their content hash
    async fn upload_image(&self, bytes: Vec<u8>, file_name: &str) -> Result<ContentHash>;

    /// Retrieval URL for a content hash. Pure; never touches the network.
    fn image_url(&self, hash: &str) -> ImageUrl;
}

/// Build the gateway download URL for `hash` under `base_url`.
/// An empty hash yields [`ImageUrl::NoImage`].
pub fn ipfs_image_url(base_url: &str, hash: &str) -> ImageUrl {
    let hash = hash.trim();
    if hash.is_empty() {
        return ImageUrl::NoImage;
    }
    ImageUrl::Resolved(format!("{}/ipfs/{}?dl=1", base_url.trim_end_matches('/'), hash))
}

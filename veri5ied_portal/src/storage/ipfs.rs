use async_trait::async_trait;
use log::{debug, error};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{ipfs_image_url, ImageStore, Result};
use crate::common::StorageError;
use crate::config::IpfsConfig;
use crate::types::{ContentHash, ImageUrl};

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Body of `/api/v0/add`
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash", default)]
    hash: Option<String>,
}

/// Client for a Kaleido-hosted IPFS node
#[derive(Debug, Clone)]
pub struct IpfsClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl IpfsClient {
    pub fn new(config: &IpfsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Request(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.endpoint_base(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ImageStore for IpfsClient {
    async fn upload_image(&self, bytes: Vec<u8>, file_name: &str) -> Result<ContentHash> {
        if self.base_url.is_empty() {
            return Err(StorageError::Request("IPFS base URL is not configured".to_string()));
        }

        let size = bytes.len();
        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/api/v0/add", self.base_url))
            .basic_auth(&self.username, Some(&self.password))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                error!("Error uploading file to IPFS: {e}");
                if e.is_timeout() {
                    StorageError::Timeout(UPLOAD_TIMEOUT)
                } else if e.is_builder() {
                    StorageError::Request(e.to_string())
                } else {
                    StorageError::NoResponse(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("IPFS upload returned {status}: {body}");
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Request(format!("Failed to parse IPFS response: {e}")))?;

        match added.hash.filter(|h| !h.trim().is_empty()) {
            Some(hash) => {
                debug!("Uploaded {file_name} ({size} bytes) to IPFS as {hash}");
                Ok(ContentHash::new(hash))
            }
            None => Err(StorageError::MissingHash),
        }
    }

    fn image_url(&self, hash: &str) -> ImageUrl {
        ipfs_image_url(&self.base_url, hash)
    }
}

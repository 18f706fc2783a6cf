//! Portal configuration.
//!
//! Settings come from an optional YAML file, then environment variables (a
//! `.env` file is loaded first when present). The resulting [`Config`] is passed
//! explicitly to the client constructors. Missing values are reported through the
//! log at startup; the process keeps running and the affected calls fail with a
//! readable error instead.

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Legacy prefix used by the browser build of the portal
const LEGACY_PREFIX: &str = "NEXT_PUBLIC_";

pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub ipfs: IpfsConfig,
    pub server: ServerConfig,
}

/// Kaleido smart-contract REST gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway host, with or without scheme
    pub base_url: String,
    pub api_key: String,
    pub contract_address: String,
    /// Account the gateway signs transactions from (`kld-from`)
    pub from_address: String,
}

impl GatewayConfig {
    /// Base URL with a scheme and without a trailing slash
    pub fn endpoint_base(&self) -> String {
        with_scheme(&self.base_url)
    }
}

/// Kaleido IPFS node
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpfsConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl IpfsConfig {
    pub fn endpoint_base(&self) -> String {
        with_scheme(&self.base_url)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Re-fetch every product right after submitting it
    pub confirm_submissions: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            confirm_submissions: true,
        }
    }
}

impl Config {
    /// Load the configuration: `.env`, then the YAML file if given, then the
    /// process environment. Never fails; problems are logged.
    pub fn load(path: Option<&Path>) -> Self {
        if dotenv::dotenv().is_ok() {
            info!("Loaded environment from .env");
        }

        let mut config = match path {
            Some(path) => Self::from_file(path).unwrap_or_else(|e| {
                warn!("Failed to read config file {}: {}, using defaults", path.display(), e);
                Self::default()
            }),
            None => Self::default(),
        };

        config.apply_env();
        config.log_missing();
        config
    }

    /// Read a YAML configuration file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Overwrite every setting that has a matching environment variable
    pub fn apply_env(&mut self) {
        override_string(&mut self.gateway.base_url, "KALEIDO_BASE_URL");
        override_string(&mut self.gateway.api_key, "KALEIDO_API_KEY");
        override_string(&mut self.gateway.contract_address, "KALEIDO_CONTRACT_ADDRESS");
        override_string(&mut self.gateway.from_address, "KALEIDO_FROM");
        override_string(&mut self.ipfs.base_url, "KALEIDO_IPFS_URL");
        override_string(&mut self.ipfs.username, "KALEIDO_IPFS_USERNAME");
        override_string(&mut self.ipfs.password, "KALEIDO_IPFS_PASSWORD");

        if let Some(port) = lookup("VERI5IED_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!("Invalid VERI5IED_PORT value {port:?}: {e}, keeping {}", self.server.port),
            }
        }

        if let Some(flag) = lookup("VERI5IED_CONFIRM_SUBMISSIONS") {
            match flag.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.server.confirm_submissions = true,
                "0" | "false" | "no" | "off" => self.server.confirm_submissions = false,
                other => warn!("Invalid VERI5IED_CONFIRM_SUBMISSIONS value {other:?}, ignoring"),
            }
        }
    }

    /// Names of the required settings that are still empty
    pub fn missing_values(&self) -> Vec<&'static str> {
        let required = [
            ("KALEIDO_BASE_URL", &self.gateway.base_url),
            ("KALEIDO_API_KEY", &self.gateway.api_key),
            ("KALEIDO_CONTRACT_ADDRESS", &self.gateway.contract_address),
            ("KALEIDO_FROM", &self.gateway.from_address),
            ("KALEIDO_IPFS_URL", &self.ipfs.base_url),
            ("KALEIDO_IPFS_USERNAME", &self.ipfs.username),
            ("KALEIDO_IPFS_PASSWORD", &self.ipfs.password),
        ];

        required
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| key)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_values().is_empty()
    }

    fn log_missing(&self) {
        let missing = self.missing_values();
        if missing.is_empty() {
            info!("Configuration complete");
            return;
        }
        for key in &missing {
            error!("Configuration value {key} is not set");
        }
        error!(
            "Kaleido configuration is incomplete ({} missing), remote calls will fail until it is fixed",
            missing.len()
        );
    }
}

fn lookup(key: &str) -> Option<String> {
    env::var(key)
        .or_else(|_| env::var(format!("{LEGACY_PREFIX}{key}")))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn override_string(target: &mut String, key: &str) {
    if let Some(value) = lookup(key) {
        *target = value.trim().to_string();
    }
}

fn with_scheme(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() || trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

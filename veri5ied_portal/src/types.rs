//! Canonical product schema shared by the gateway client, the workflows and the API.
//!
//! Only one product shape exists inside the crate. Older field names written by
//! earlier revisions of the contract front-end (`name`, `productionDate`,
//! `image`, `productID`) are migrated on the way in through serde aliases; any
//! other shape is rejected at the client boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Date format used on the wire and in forms
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// A product as recorded on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Canonical identifier. Either the manufacturer's batch number or a short
    /// generated product ID written into the same slot.
    #[serde(alias = "productID", alias = "productId")]
    pub batch_number: String,

    #[serde(alias = "name")]
    pub product_name: String,

    #[serde(alias = "productionDate", deserialize_with = "deserialize_calendar_date")]
    pub manufacturing_date: NaiveDate,

    #[serde(deserialize_with = "deserialize_calendar_date")]
    pub expiry_date: NaiveDate,

    /// NAFDAC registration number
    pub nafdac_number: String,

    /// IPFS content hash of the product image, empty when there is none
    #[serde(alias = "image", default)]
    pub product_image: String,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_text")]
    pub producer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_optional_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Product {
    pub fn has_image(&self) -> bool {
        !self.product_image.trim().is_empty()
    }

    /// Whether the product has expired on the given day
    pub fn is_expired_on(&self, day: NaiveDate) -> bool {
        self.expiry_date < day
    }
}

/// IPFS content hash returned by an upload
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Retrieval URL of a product image. `NoImage` is the sentinel for products
/// stored without one and serializes as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImageUrl {
    Resolved(String),
    NoImage,
}

impl ImageUrl {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ImageUrl::Resolved(url) => Some(url),
            ImageUrl::NoImage => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ImageUrl::Resolved(_))
    }
}

impl fmt::Display for ImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageUrl::Resolved(url) => f.write_str(url),
            ImageUrl::NoImage => f.write_str("no image"),
        }
    }
}

/// A product found on the ledger together with its resolved image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedProduct {
    #[serde(flatten)]
    pub product: Product,
    pub image_url: ImageUrl,
}

/// Parse a calendar date as written by forms (`YYYY-MM-DD`) or as an RFC 3339
/// timestamp, keeping only the date part of the latter.
pub fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, DATE_FORMAT) {
        return Some(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).date_naive())
}

fn deserialize_calendar_date<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    let raw = String::deserialize(deserializer)?;
    parse_calendar_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid calendar date: {raw:?}")))
}

fn deserialize_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| D::Error::custom(format!("invalid timestamp {raw:?}: {e}"))),
    }
}

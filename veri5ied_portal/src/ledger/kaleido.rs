use async_trait::async_trait;
use base64::Engine;
use log::{debug, error, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde_json::{json, Map, Value};
use std::time::Duration;

use super::ProductLedger;
use crate::common::{GatewayError, Result};
use crate::config::GatewayConfig;
use crate::types::{Product, DATE_FORMAT};

/// Every gateway call gives up after this long
pub const GATEWAY_TIMEOUT: Duration = Duration::from_secs(30);

const IDENTIFIER_FIELD: &str = "batchNumber";

/// Identifier fields written by older contract revisions
const LEGACY_IDENTIFIER_FIELDS: [&str; 2] = ["productID", "productId"];

/// Client for the Kaleido REST gateway in front of the product registry contract
#[derive(Debug, Clone)]
pub struct KaleidoGateway {
    client: Client,
    base_url: String,
    contract_address: String,
    from_address: String,
    auth_header: String,
    timeout: Duration,
}

impl KaleidoGateway {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        Self::with_timeout(config, GATEWAY_TIMEOUT)
    }

    pub fn with_timeout(config: &GatewayConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Request(format!("Failed to create HTTP client: {e}")))?;

        let encoded = base64::engine::general_purpose::STANDARD.encode(config.api_key.as_bytes());

        Ok(Self {
            client,
            base_url: config.endpoint_base(),
            contract_address: config.contract_address.trim().to_string(),
            from_address: config.from_address.trim().to_string(),
            auth_header: format!("Basic {encoded}"),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn method_url(&self, method: &str) -> Result<String> {
        if self.base_url.is_empty() {
            return Err(GatewayError::Request("gateway base URL is not configured".to_string()));
        }
        if self.contract_address.is_empty() {
            return Err(GatewayError::Request("contract address is not configured".to_string()));
        }
        Ok(format!("{}/{}/{}", self.base_url, self.contract_address, method))
    }

    async fn call(&self, method: &str, body: &Value, read_only: bool) -> Result<Response> {
        let url = self.method_url(method)?;

        let mut query = vec![("kld-from", self.from_address.as_str()), ("kld-sync", "true")];
        if read_only {
            query.push(("kld-call", "true"));
        }

        let response = self
            .client
            .post(&url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(CONTENT_TYPE, "application/json")
            .query(&query)
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(method, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Gateway {method} returned {status}: {body}");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    fn send_error(&self, method: &str, err: reqwest::Error) -> GatewayError {
        error!("Gateway {method} request failed: {err}");
        if err.is_timeout() {
            GatewayError::Timeout(self.timeout)
        } else if err.is_builder() {
            GatewayError::Request(err.to_string())
        } else {
            GatewayError::NoResponse(err.to_string())
        }
    }
}

#[async_trait]
impl ProductLedger for KaleidoGateway {
    async fn submit_product(&self, product: &Product) -> Result<String> {
        debug!("Sending product {} to blockchain", product.batch_number);

        let body = add_product_inputs(product);
        let response = self.call("addProduct", &body, false).await?;

        if let Ok(text) = response.text().await {
            debug!("Blockchain response for addProduct: {text}");
        }

        Ok(product.batch_number.clone())
    }

    async fn fetch_product(&self, identifier: &str) -> Result<Option<Product>> {
        let response = self
            .call("getProduct", &json!({ "batchNumber": identifier }), true)
            .await?;

        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::NoResponse(format!("Failed to read response body: {e}")))?;
        debug!("Blockchain response for getProduct: {text}");

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| GatewayError::UnexpectedShape(format!("response is not JSON: {e}")))?;

        decode_product_output(&value)
    }
}

/// Turn a `getProduct` response body into a product.
///
/// A missing or null `output`, or an `output` whose identifier is empty (the
/// contract's zero value for an unknown key), means the product does not exist.
pub fn decode_product_output(value: &Value) -> Result<Option<Product>> {
    let Some(body) = value.as_object() else {
        return Err(GatewayError::UnexpectedShape(format!("response is not an object: {value}")));
    };

    let fields = match body.get("output") {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            return Err(GatewayError::UnexpectedShape(format!("output is not an object: {other}")))
        }
    };

    let mut fields = fields.clone();
    let identifier = canonical_identifier(&mut fields);
    if identifier.is_empty() {
        return Ok(None);
    }

    serde_json::from_value(Value::Object(fields))
        .map(Some)
        .map_err(|e| {
            warn!("Product {identifier} has an unreadable shape: {e}");
            GatewayError::UnexpectedShape(format!("product {identifier}: {e}"))
        })
}

/// Collapse the identifier fields into `batchNumber`. Older contract revisions
/// return a separate `productID` next to the batch number; the batch number
/// wins when both are set.
fn canonical_identifier(fields: &mut Map<String, Value>) -> String {
    let legacy: Vec<Value> = LEGACY_IDENTIFIER_FIELDS
        .iter()
        .filter_map(|key| fields.remove(*key))
        .collect();

    let current = fields
        .get(IDENTIFIER_FIELD)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or_default()
        .to_string();
    if !current.is_empty() {
        return current;
    }

    let fallback = legacy
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|id| !id.is_empty())
        .unwrap_or_default()
        .to_string();
    if !fallback.is_empty() {
        fields.insert(IDENTIFIER_FIELD.to_string(), Value::String(fallback.clone()));
    }
    fallback
}

/// `addProduct` takes exactly these six inputs. Producer and timestamp are
/// not part of the contract record and are never sent.
pub(crate) fn add_product_inputs(product: &Product) -> Value {
    json!({
        "batchNumber": product.batch_number,
        "productName": product.product_name,
        "manufacturingDate": product.manufacturing_date.format(DATE_FORMAT).to_string(),
        "expiryDate": product.expiry_date.format(DATE_FORMAT).to_string(),
        "nafdacNumber": product.nafdac_number,
        "productImage": product.product_image,
    })
}

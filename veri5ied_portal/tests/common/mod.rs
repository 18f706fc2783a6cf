//! Fake Kaleido gateway and IPFS node served on an ephemeral local port.

#![allow(dead_code)]

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use veri5ied_portal::config::{GatewayConfig, IpfsConfig};

pub const CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";
pub const FROM: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const API_KEY: &str = "u0user:u0secret";
pub const IPFS_USER: &str = "ipfs-user";
pub const IPFS_PASSWORD: &str = "ipfs-pass";

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub contract: String,
    pub method: String,
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Default)]
pub struct FakeState {
    /// Raw `output` objects keyed by identifier
    pub products: HashMap<String, Value>,
    pub calls: Vec<RecordedCall>,
    /// Answer every contract call with this status and body
    pub failure: Option<(u16, String)>,
    pub delay: Option<Duration>,
    /// Leave `Hash` out of IPFS add responses
    pub omit_hash: bool,
    pub uploads: Vec<(String, Vec<u8>, Option<String>)>,
}

pub struct FakeKaleido {
    pub base_url: String,
    pub state: Arc<Mutex<FakeState>>,
}

impl FakeKaleido {
    pub async fn start() -> Self {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let app = Router::new()
            .route("/api/v0/add", post(ipfs_add))
            .route("/:contract/:method", post(contract_call))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{address}"),
            state,
        }
    }

    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.base_url.clone(),
            api_key: API_KEY.to_string(),
            contract_address: CONTRACT.to_string(),
            from_address: FROM.to_string(),
        }
    }

    pub fn ipfs_config(&self) -> IpfsConfig {
        IpfsConfig {
            base_url: self.base_url.clone(),
            username: IPFS_USER.to_string(),
            password: IPFS_PASSWORD.to_string(),
        }
    }

    pub fn insert_output(&self, identifier: &str, output: Value) {
        self.state.lock().products.insert(identifier.to_string(), output);
    }

    pub fn fail_with(&self, status: u16, body: &str) {
        self.state.lock().failure = Some((status, body.to_string()));
    }

    pub fn delay_responses(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state.lock().calls.clone()
    }
}

async fn contract_call(
    State(state): State<Arc<Mutex<FakeState>>>,
    Path((contract, method)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let delay = state.lock().delay;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    let mut state = state.lock();
    state.calls.push(RecordedCall {
        contract,
        method: method.clone(),
        query,
        authorization: headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: body.clone(),
    });

    if let Some((status, body)) = state.failure.clone() {
        let status = StatusCode::from_u16(status).unwrap();
        return (status, body).into_response();
    }

    match method.as_str() {
        "addProduct" => {
            let id = body["batchNumber"].as_str().unwrap_or_default().to_string();
            state.products.insert(id, body);
            Json(json!({ "headers": { "type": "TransactionSuccess" }, "transactionHash": "0xabc" }))
                .into_response()
        }
        "getProduct" => {
            let id = body["batchNumber"].as_str().unwrap_or_default();
            // The contract answers unknown keys with its zero-valued struct
            let output = state.products.get(id).cloned().unwrap_or_else(|| {
                json!({
                    "batchNumber": "",
                    "productName": "",
                    "manufacturingDate": "",
                    "expiryDate": "",
                    "nafdacNumber": "",
                    "productImage": ""
                })
            });
            Json(json!({ "output": output })).into_response()
        }
        _ => (StatusCode::NOT_FOUND, "unknown method").into_response(),
    }
}

async fn ipfs_add(
    State(state): State<Arc<Mutex<FakeState>>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut received = None;
    while let Some(field) = multipart.next_field().await.unwrap() {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await.unwrap().to_vec();
            received = Some((name, bytes));
        }
    }

    let Some((name, bytes)) = received else {
        return (StatusCode::BAD_REQUEST, "missing file").into_response();
    };

    let mut state = state.lock();
    let hash = format!("bafyfake{:04}", state.uploads.len() + 1);
    let size = bytes.len();
    state.uploads.push((name.clone(), bytes, authorization));

    if state.omit_hash {
        Json(json!({ "Name": name, "Size": size.to_string() })).into_response()
    } else {
        Json(json!({ "Name": name, "Hash": hash, "Size": size.to_string() })).into_response()
    }
}

//! JSON-RPC 2.0 wire types and transports.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use chainnotify_core::NotifyError;

// ─── Wire types ───────────────────────────────────────────────────────────────

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Vec<Value>,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params,
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Echoed request id; nodes differ on number vs string.
    #[serde(default)]
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Successful response carrying `result`.
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id: Value::from(id),
            result: Some(result),
            error: None,
        }
    }

    /// Unwrap the result value or return the node's error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can occur during an RPC transport operation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failure or non-2xx HTTP status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// JSON-RPC error returned by the node.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("Request timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The result did not have the expected shape.
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
}

impl From<TransportError> for NotifyError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Timeout { ms } => NotifyError::Timeout {
                operation: "json-rpc request".into(),
                ms,
            },
            other => NotifyError::GatewayUnavailable(other.to_string()),
        }
    }
}

// ─── Transport ────────────────────────────────────────────────────────────────

/// Sends one JSON-RPC request to a node.
///
/// Object-safe; stored as `Arc<dyn RpcTransport>`.
#[async_trait]
pub trait RpcTransport: Send + Sync + 'static {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError>;

    /// Endpoint identifier for logs.
    fn url(&self) -> &str;
}

/// JSON-RPC over HTTP POST, backed by `reqwest`.
pub struct HttpTransport {
    url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
            request_timeout,
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&req)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout {
                        ms: self.request_timeout.as_millis() as u64,
                    }
                } else {
                    TransportError::Http(e.to_string())
                }
            })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<JsonRpcResponse>()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Typed calls over a shared transport. Cheap to clone.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn RpcTransport>,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    pub fn new(transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            transport,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn url(&self) -> &str {
        self.transport.url()
    }

    /// Call `method` and deserialize the result.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resp = self
            .transport
            .send(JsonRpcRequest::new(id, method, params))
            .await?;
        let result = resp.into_result().map_err(TransportError::Rpc)?;
        Ok(serde_json::from_value(result)?)
    }
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_hex_u64(s: &str) -> Result<u64, TransportError> {
    let digits = s.strip_prefix("0x").unwrap_or(s);
    u64::from_str_radix(digits, 16)
        .map_err(|e| TransportError::Http(format!("invalid hex quantity '{s}': {e}")))
}

/// Encode a block number as a hex quantity.
pub fn to_hex(n: u64) -> String {
    format!("{n:#x}")
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::Mutex;

    type Handler = dyn Fn(&str, &[Value]) -> Result<Value, JsonRpcError> + Send + Sync;

    /// Answers requests with a closure and records them.
    pub struct MockTransport {
        handler: Box<Handler>,
        pub requests: Mutex<Vec<JsonRpcRequest>>,
    }

    impl MockTransport {
        pub fn new(
            handler: impl Fn(&str, &[Value]) -> Result<Value, JsonRpcError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                handler: Box::new(handler),
                requests: Mutex::new(vec![]),
            }
        }

        pub fn calls(&self, method: &str) -> Vec<JsonRpcRequest> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.method == method)
                .cloned()
                .collect()
        }
    }

    #[async_trait]
    impl RpcTransport for MockTransport {
        async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
            self.requests.lock().unwrap().push(req.clone());
            Ok(match (self.handler)(&req.method, &req.params) {
                Ok(result) => JsonRpcResponse::ok(req.id, result),
                Err(error) => JsonRpcResponse {
                    jsonrpc: "2.0".into(),
                    id: Value::from(req.id),
                    result: None,
                    error: Some(error),
                },
            })
        }

        fn url(&self) -> &str {
            "mock://node"
        }
    }
}

use crate::{ProviderError, Result};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{instrument, trace, warn};

/// A JSON-RPC request sink: the base HTTP endpoint, the in-process node, or
/// another interceptor layer.
#[async_trait::async_trait]
pub trait Transport: std::fmt::Debug + Send + Sync {
    /// Issue a single JSON-RPC request and return its `result` value.
    async fn request(&self, method: &str, params: Value) -> Result<Value>;
}

/// A boxed, dynamically dispatched [`Transport`], the unit of stack
/// composition.
pub type BoxTransport = Box<dyn Transport>;

#[async_trait::async_trait]
impl Transport for BoxTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        (**self).request(method, params).await
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

/// A plain HTTP JSON-RPC transport.
#[derive(Debug)]
pub struct HttpTransport {
    url: reqwest::Url,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpTransport {
    /// Create a transport with the given URL and client.
    pub const fn new_with_client(url: reqwest::Url, client: reqwest::Client) -> Self {
        Self { url, client, next_id: AtomicU64::new(1) }
    }

    /// Create a transport with the given URL and a new reqwest client.
    pub fn new(url: reqwest::Url) -> Self {
        Self::new_with_client(url, reqwest::Client::new())
    }

    /// Create a transport from a string URL.
    pub fn new_from_string(url: &str) -> Result<Self> {
        Ok(Self::new(reqwest::Url::parse(url)?))
    }

    /// The client used to send requests.
    pub const fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, params))]
    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let response: Value = self
            .client
            .post(self.url.clone())
            .json(&body)
            .send()
            .await?
            .error_for_status()
            .inspect_err(|e| warn!(%e, "upstream rejected request"))?
            .json()
            .await
            .inspect_err(|e| warn!(%e, "failed to parse upstream response"))?;

        if let Some(error) = response.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32603);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown upstream error")
                .to_owned();
            trace!(code, %message, "upstream returned error");
            return Err(ProviderError::Rpc { code, message });
        }

        Ok(response.get("result").cloned().unwrap_or(json!(null)))
    }
}

//! Outgoing JSON-RPC calls.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde_json::{json, Value};
use tracing::{instrument, trace};

use crate::{error::CallError, jsonrpc::RpcResponse};

/// Outgoing JSON-RPC calls to other agents' `/mcp` endpoints.
///
/// Cheap to clone; clones share the connection pool and the id counter.
#[derive(Debug, Clone, Default)]
pub struct RpcClient {
    http: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl RpcClient {
    #[allow(missing_docs)]
    pub fn new() -> Self {
        Self::default()
    }

    /// The underlying HTTP client, for plain REST calls.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Call `method` on `endpoint` and return its `result`.
    ///
    /// The whole exchange (connect, send, receive, decode) is bounded by `timeout`.
    #[instrument(skip(self, params), fields(id = tracing::field::Empty))]
    pub async fn call(
        &self,
        endpoint: &str,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, CallError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::Span::current().record("id", id);
        let request = json!({
            "jsonrpc": crate::jsonrpc::JSONRPC_VERSION,
            "id": id,
            "method": method,
            "params": params,
        });

        let exchange = async {
            let response = self.http.post(endpoint).json(&request).send().await?;
            let status = response.status();
            if !status.is_success() {
                return Err(CallError::Status(status.as_u16()));
            }
            let body = response.bytes().await?;
            let response: RpcResponse = serde_json::from_slice(&body)?;
            Ok(response.into_result()?)
        };

        let result = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| CallError::Timeout(timeout))?;
        trace!(ok = result.is_ok(), "call finished");
        result
    }
}

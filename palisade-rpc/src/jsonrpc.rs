//! JSON-RPC 2.0 transport over HTTPS.
//!
//! The upstream exposes its `common` and `object` services through a
//! single `/jsonrpc` endpoint; every call is a POST with
//! `{"jsonrpc": "2.0", "method": "call", "params": {service, method,
//! args}}`. Upstream faults arrive as a JSON-RPC `error` object whose
//! `data.message` holds the server-side exception text.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::debug;

use palisade_core::UpstreamConfig;

use crate::transport::{RpcError, Transport};

/// Production transport speaking JSON-RPC 2.0 over reqwest.
pub struct JsonRpcTransport {
    client: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Build a transport from the upstream configuration.
    ///
    /// The per-request timeout and certificate verification policy come
    /// from the config; the timeout bounds the whole call, which is the
    /// only cancellation point the proxy offers.
    pub fn new(config: &UpstreamConfig) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            client,
            endpoint: config.rpc_endpoint(),
            next_id: AtomicU64::new(1),
        })
    }

    /// POST one JSON-RPC call and unwrap its result.
    async fn call_service(
        &self,
        service: &str,
        method: &str,
        args: Value,
    ) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": service,
                "method": method,
                "args": args,
            },
            "id": id,
        });

        debug!(service, method, id, "dispatching upstream rpc");
        let response = self.client.post(&self.endpoint).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Protocol {
                reason: format!("unexpected HTTP status {}", status),
            });
        }

        let payload: Value = response.json().await?;

        if let Some(error) = payload.get("error") {
            // The server exception text lives in error.data.message;
            // error.message is only the generic "Odoo Server Error".
            let message = error
                .pointer("/data/message")
                .and_then(Value::as_str)
                .or_else(|| error.get("message").and_then(Value::as_str))
                .unwrap_or("upstream returned an unspecified error");
            return Err(RpcError::Fault {
                message: message.to_string(),
            });
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Transport for JsonRpcTransport {
    async fn authenticate(
        &self,
        database: &str,
        username: &str,
        credential: &str,
        extra: &Value,
    ) -> Result<Value, RpcError> {
        self.call_service(
            "common",
            "authenticate",
            json!([database, username, credential, extra]),
        )
        .await
    }

    async fn execute_kw(
        &self,
        database: &str,
        uid: i64,
        credential: &str,
        model: &str,
        method: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, RpcError> {
        self.call_service(
            "object",
            "execute_kw",
            json!([database, uid, credential, model, method, args, kwargs]),
        )
        .await
    }

    async fn server_version(&self) -> Result<Value, RpcError> {
        self.call_service("common", "version", json!([])).await
    }
}

impl std::fmt::Debug for JsonRpcTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonRpcTransport")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

//! Transport trait and raw transport errors.
//!
//! The transport is a stateless remote-procedure channel. It knows nothing
//! about caching, validation, or error classification; it either returns
//! the upstream result or one of the raw [`RpcError`] variants, which the
//! gateway classifies exactly once.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

/// Raw transport-level errors, prior to classification.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The HTTP layer failed: connection refused, timeout, TLS, DNS.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The channel worked but the response was not a valid RPC payload.
    #[error("Protocol error: {reason}")]
    Protocol { reason: String },

    /// The upstream server processed the call and rejected it.
    #[error("Upstream fault: {message}")]
    Fault { message: String },
}

/// A remote-procedure channel to the upstream server.
///
/// Implementations must be safe to share across concurrent in-flight
/// operations; the gateway holds one instance behind an `Arc`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticate and return the upstream identity value.
    ///
    /// The upstream returns a numeric user id on success and a falsy
    /// value on bad credentials; the gateway interprets both.
    async fn authenticate(
        &self,
        database: &str,
        username: &str,
        credential: &str,
        extra: &Value,
    ) -> Result<Value, RpcError>;

    /// Invoke `method` on `model` with positional and keyword arguments.
    async fn execute_kw(
        &self,
        database: &str,
        uid: i64,
        credential: &str,
        model: &str,
        method: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, RpcError>;

    /// Fetch server version metadata.
    async fn server_version(&self) -> Result<Value, RpcError>;
}

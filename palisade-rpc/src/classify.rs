//! One-time classification of transport errors into service errors.
//!
//! Transport-level failures are always retryable `TransportError`s.
//! Upstream faults are retryable `UpstreamFault`s, narrowed to a more
//! specific kind when the fault text matches known substrings. The
//! matching is best-effort: upstream wording changes degrade a narrowed
//! kind back to the generic fault, never to a wrong narrow kind.

use palisade_core::{ErrorKind, ServiceError};

use crate::transport::RpcError;

/// Classify a raw transport error into a [`ServiceError`].
///
/// Called once, at the gateway boundary. Downstream layers never
/// re-classify.
pub fn classify(err: RpcError) -> ServiceError {
    match err {
        RpcError::Http(http) => {
            let detail = if http.is_timeout() {
                "request timed out".to_string()
            } else if http.is_connect() {
                "connection failed".to_string()
            } else {
                http.to_string()
            };
            ServiceError::transport(format!("Upstream request failed: {}", detail))
        }
        RpcError::Protocol { reason } => {
            ServiceError::transport(format!("Upstream protocol error: {}", reason))
        }
        RpcError::Fault { message } => classify_fault(&message),
    }
}

/// Narrow an upstream fault message by substring matching.
///
/// Unmatched messages stay `UpstreamFault`; callers must not rely on an
/// exact narrow kind for arbitrary upstream text.
pub fn classify_fault(message: &str) -> ServiceError {
    let lower = message.to_lowercase();

    let kind = if lower.contains("invalid field") || lower.contains("unknown field") {
        ErrorKind::InvalidField
    } else if lower.contains("invalid leaf") || lower.contains("invalid domain") {
        ErrorKind::InvalidDomain
    } else if lower.contains("has no attribute")
        || lower.contains("does not exist on the model")
        || lower.contains("invalid method")
    {
        ErrorKind::InvalidMethod
    } else if lower.contains("invalid model")
        || lower.contains("model not found")
        || (lower.contains("object") && lower.contains("doesn't exist"))
    {
        ErrorKind::InvalidEntity
    } else {
        ErrorKind::UpstreamFault
    };

    ServiceError::new(kind, message)
}

//! Uniform Response Envelope
//!
//! Every public proxy operation returns the same envelope: `{ok, data,
//! meta}` on success, `{ok, error, meta}` on failure. No exception or
//! panic crosses the service boundary; the front end can serialize an
//! envelope directly into a tool-call result.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ServiceError;

/// Whether a read was answered from the cache or went upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheOutcome {
    Hit,
    Miss,
}

/// Response metadata attached to every envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Configured upstream server version, e.g. "18.0".
    pub server_version: String,

    /// Wire protocol the gateway speaks, e.g. "jsonrpc".
    pub endpoint_mode: String,

    /// Cache outcome for cacheable reads; absent for writes and when
    /// caching is disabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheOutcome>,
}

impl ResponseMeta {
    /// Metadata with no cache marker.
    pub fn new(server_version: impl Into<String>, endpoint_mode: impl Into<String>) -> Self {
        Self {
            server_version: server_version.into(),
            endpoint_mode: endpoint_mode.into(),
            cache: None,
        }
    }

    /// Attach a cache outcome marker.
    pub fn with_cache(mut self, outcome: CacheOutcome) -> Self {
        self.cache = Some(outcome);
        self
    }
}

/// The uniform operation result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub ok: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ServiceError>,

    pub meta: ResponseMeta,
}

impl Envelope {
    /// Build a success envelope.
    pub fn success(data: Value, meta: ResponseMeta) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
            meta,
        }
    }

    /// Build a failure envelope.
    pub fn failure(error: ServiceError, meta: ResponseMeta) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(error),
            meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta() -> ResponseMeta {
        ResponseMeta::new("18.0", "jsonrpc")
    }

    #[test]
    fn test_success_envelope_shape() {
        let env = Envelope::success(json!({"count": 3}), meta().with_cache(CacheOutcome::Hit));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["ok"], json!(true));
        assert_eq!(json["data"]["count"], json!(3));
        assert_eq!(json["meta"]["cache"], json!("hit"));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_failure_envelope_shape() {
        let env = Envelope::failure(ServiceError::invalid_entity("res.nope"), meta());
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["ok"], json!(false));
        assert_eq!(json["error"]["kind"], json!("INVALID_ENTITY"));
        assert_eq!(json["error"]["retryable"], json!(true));
        assert!(json.get("data").is_none());
        // No cache marker on failures unless a read got that far.
        assert!(json["meta"].get("cache").is_none());
    }

    #[test]
    fn test_envelope_round_trip() {
        let env = Envelope::success(json!([1, 2, 3]), meta().with_cache(CacheOutcome::Miss));
        let text = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&text).unwrap();
        assert_eq!(back, env);
    }
}

//! Cache entry with TTL support.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// One cached value with its creation time and time-to-live.
///
/// The value is opaque, immutable data once stored; readers receive
/// clones and must not expect in-place mutation to be visible.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Value,
    created_at: DateTime<Utc>,
    ttl_secs: i64,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    ///
    /// A TTL of zero or below means the entry never expires.
    pub fn new(value: Value, ttl_secs: i64) -> Self {
        Self::with_created_at(value, ttl_secs, Utc::now())
    }

    /// Create an entry with an explicit creation time.
    pub(crate) fn with_created_at(
        value: Value,
        ttl_secs: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            value,
            created_at,
            ttl_secs,
        }
    }

    /// Whether the entry has outlived its TTL.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry check against an explicit clock, for deterministic tests.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if self.ttl_secs <= 0 {
            return false;
        }
        now.signed_duration_since(self.created_at) > Duration::seconds(self.ttl_secs)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }
}

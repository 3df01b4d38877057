//! In-memory TTL cache with capacity-bounded eviction.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use palisade_core::CacheSettings;

use crate::entry::CacheEntry;

/// Point-in-time cache statistics, taken after an expiration sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub size: usize,
    pub max_size: usize,
    pub ttl_secs: i64,
}

/// Thread-safe TTL cache keyed by fingerprint strings.
///
/// Every mutating path runs under one lock: sweep expired entries, evict
/// over-capacity entries oldest-created-first, then insert. A disabled
/// cache turns `get` into a constant miss and `set` into a no-op.
#[derive(Debug)]
pub struct TtlCache {
    settings: CacheSettings,
    inner: Mutex<HashMap<String, CacheEntry>>,
}

impl TtlCache {
    /// Create a cache from settings.
    pub fn new(settings: CacheSettings) -> Self {
        info!(
            enabled = settings.enabled,
            ttl_secs = settings.ttl_secs,
            max_size = settings.max_size,
            "cache initialized"
        );
        Self {
            settings,
            inner: Mutex::new(HashMap::new()),
        }
    }

    pub fn enabled(&self) -> bool {
        self.settings.enabled
    }

    pub fn settings(&self) -> &CacheSettings {
        &self.settings
    }

    /// The TTL applied by [`TtlCache::set`].
    pub fn default_ttl(&self) -> i64 {
        self.settings.ttl_secs
    }

    /// Get a value. Sweeps expired entries first; absent and expired keys
    /// both count as misses.
    pub fn get(&self, key: &str) -> Option<Value> {
        if !self.settings.enabled {
            return None;
        }

        let mut map = self.lock();
        Self::sweep(&mut map);

        match map.get(key) {
            None => {
                debug!(key, "cache miss");
                None
            }
            Some(entry) if entry.is_expired() => {
                map.remove(key);
                debug!(key, "cache expired");
                None
            }
            Some(entry) => {
                debug!(key, "cache hit");
                Some(entry.value().clone())
            }
        }
    }

    /// Store a value under the default TTL.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.set_with_ttl(key, value, self.settings.ttl_secs);
    }

    /// Store a value under an explicit TTL.
    ///
    /// Sweeps, then evicts oldest-created entries until the new entry fits
    /// without pushing the cache past `max_size`.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: Value, ttl_secs: i64) {
        if !self.settings.enabled {
            return;
        }
        if self.settings.max_size == 0 {
            debug!("cache capacity is zero, skipping store");
            return;
        }

        let key = key.into();
        let mut map = self.lock();
        Self::sweep(&mut map);
        self.evict_for_insert(&mut map);

        debug!(key, ttl_secs, "cache set");
        map.insert(key, CacheEntry::new(value, ttl_secs));
    }

    /// Remove one entry. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        if !self.settings.enabled {
            return false;
        }

        let mut map = self.lock();
        let removed = map.remove(key).is_some();
        if removed {
            debug!(key, "cache delete");
        }
        removed
    }

    /// Remove every entry. Returns the count removed.
    pub fn clear(&self) -> usize {
        let mut map = self.lock();
        let count = map.len();
        map.clear();
        info!(count, "cache cleared");
        count
    }

    /// Snapshot statistics after a sweep.
    pub fn stats(&self) -> CacheStats {
        let mut map = self.lock();
        Self::sweep(&mut map);
        CacheStats {
            enabled: self.settings.enabled,
            size: map.len(),
            max_size: self.settings.max_size,
            ttl_secs: self.settings.ttl_secs,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove all expired entries.
    fn sweep(map: &mut HashMap<String, CacheEntry>) {
        let before = map.len();
        map.retain(|_, entry| !entry.is_expired());
        let removed = before - map.len();
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
    }

    /// Evict oldest-created entries until one more insert stays within
    /// capacity. Creation time only: reads never refresh recency.
    fn evict_for_insert(&self, map: &mut HashMap<String, CacheEntry>) {
        if map.len() < self.settings.max_size {
            return;
        }

        let mut by_age: Vec<(String, chrono::DateTime<chrono::Utc>)> = map
            .iter()
            .map(|(key, entry)| (key.clone(), entry.created_at()))
            .collect();
        by_age.sort_by(|a, b| a.1.cmp(&b.1));

        let excess = map.len() + 1 - self.settings.max_size;
        for (key, _) in by_age.into_iter().take(excess) {
            map.remove(&key);
        }
        debug!(evicted = excess, "evicted oldest cache entries");
    }

    #[cfg(test)]
    fn insert_entry(&self, key: impl Into<String>, entry: CacheEntry) {
        self.lock().insert(key.into(), entry);
    }
}

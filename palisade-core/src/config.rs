//! Palisade Configuration Module
//!
//! Configuration is loaded from environment variables with sensible
//! defaults, mirroring how the upstream connection is usually provisioned
//! in container deployments. Required fields missing at load time are a
//! fatal constructor error; nothing downstream ever sees a half-built
//! configuration.

use thiserror::Error;

/// Default upstream request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default TTL for cached results in seconds.
const DEFAULT_CACHE_TTL_SECS: i64 = 300;

/// Default maximum number of resident cache entries.
const DEFAULT_CACHE_MAX_SIZE: usize = 1000;

/// Upstream server versions this proxy knows how to talk to.
const SUPPORTED_VERSIONS: &[&str] = &["18.0", "19.0"];

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration value: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

// ============================================================================
// UPSTREAM CONNECTION CONFIGURATION
// ============================================================================

/// Connection settings for the upstream server.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream instance (no trailing slash).
    pub url: String,

    /// Database name to authenticate against.
    pub database: String,

    /// Login username (usually an email address).
    pub username: String,

    /// Password, if API-key authentication is not used.
    pub password: Option<String>,

    /// API key; takes precedence over the password when both are set.
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,

    /// Whether to verify TLS certificates (disable for dev only).
    pub verify_ssl: bool,

    /// Upstream server version, e.g. "18.0".
    pub version: String,
}

impl UpstreamConfig {
    /// The credential sent on every RPC call: the API key when present,
    /// the password otherwise.
    pub fn credential(&self) -> &str {
        self.api_key
            .as_deref()
            .or(self.password.as_deref())
            .unwrap_or_default()
    }

    /// The JSON-RPC endpoint derived from the base URL.
    pub fn rpc_endpoint(&self) -> String {
        format!("{}/jsonrpc", self.url)
    }

    /// Wire protocol identifier surfaced in response metadata.
    pub fn endpoint_mode(&self) -> &'static str {
        "jsonrpc"
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "url".to_string(),
                value: self.url,
                reason: "must start with http:// or https://".to_string(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout".to_string(),
                value: self.timeout_secs.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "version".to_string(),
                value: self.version,
                reason: format!("must be one of: {}", SUPPORTED_VERSIONS.join(", ")),
            });
        }
        if self.password.is_none() && self.api_key.is_none() {
            return Err(ConfigError::MissingRequired {
                field: "password or api_key".to_string(),
            });
        }
        let mut config = self;
        config.url = config.url.trim_end_matches('/').to_string();
        Ok(config)
    }
}

// ============================================================================
// CACHE CONFIGURATION
// ============================================================================

/// Settings for the result cache.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Master switch; a disabled cache stores nothing and hits nothing.
    pub enabled: bool,

    /// Default TTL in seconds for cached results. Zero or negative means
    /// entries never expire.
    pub ttl_secs: i64,

    /// Maximum number of resident entries before eviction.
    pub max_size: usize,

    /// Clear the cache after successful writes instead of letting stale
    /// reads age out via TTL. Off by default: the conservative stale-read
    /// window is documented behavior.
    pub invalidate_on_write: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_size: DEFAULT_CACHE_MAX_SIZE,
            invalidate_on_write: false,
        }
    }
}

// ============================================================================
// TOP-LEVEL CONFIGURATION
// ============================================================================

/// Process-level configuration: upstream connection plus cache policy.
#[derive(Debug, Clone)]
pub struct Config {
    pub upstream: UpstreamConfig,
    pub cache: CacheSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ODOO_URL` (required): upstream base URL
    /// - `ODOO_DB` (required): database name
    /// - `ODOO_USERNAME` (required): login username
    /// - `ODOO_PASSWORD` / `ODOO_API_KEY`: at least one required
    /// - `ODOO_TIMEOUT`: request timeout in seconds (default: 120)
    /// - `ODOO_VERIFY_SSL`: "true" or "false" (default: true)
    /// - `ODOO_VERSION`: upstream version (default: "18.0")
    /// - `CACHE_ENABLED`: "true" or "false" (default: true)
    /// - `CACHE_TTL`: default TTL in seconds (default: 300)
    /// - `CACHE_MAX_SIZE`: max resident entries (default: 1000)
    /// - `CACHE_INVALIDATE_ON_WRITE`: "true" or "false" (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| ConfigError::MissingRequired {
                field: name.to_string(),
            })
        };

        let upstream = UpstreamConfig {
            url: required("ODOO_URL")?,
            database: required("ODOO_DB")?,
            username: required("ODOO_USERNAME")?,
            password: std::env::var("ODOO_PASSWORD").ok(),
            api_key: std::env::var("ODOO_API_KEY").ok(),
            timeout_secs: parse_var("ODOO_TIMEOUT", DEFAULT_TIMEOUT_SECS)?,
            verify_ssl: parse_bool_var("ODOO_VERIFY_SSL", true),
            version: std::env::var("ODOO_VERSION").unwrap_or_else(|_| "18.0".to_string()),
        };

        let cache = CacheSettings {
            enabled: parse_bool_var("CACHE_ENABLED", true),
            ttl_secs: parse_var("CACHE_TTL", DEFAULT_CACHE_TTL_SECS)?,
            max_size: parse_var("CACHE_MAX_SIZE", DEFAULT_CACHE_MAX_SIZE)?,
            invalidate_on_write: parse_bool_var("CACHE_INVALIDATE_ON_WRITE", false),
        };

        Self::from_parts(upstream, cache)
    }

    /// Build and validate a configuration from already-collected parts.
    pub fn from_parts(
        upstream: UpstreamConfig,
        cache: CacheSettings,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            upstream: upstream.validate()?,
            cache,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            field: name.to_string(),
            value: raw,
            reason: "could not be parsed".to_string(),
        }),
        Err(_) => Ok(default),
    }
}

fn parse_bool_var(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .map(|s| s.to_lowercase() == "true")
        .unwrap_or(default)
}

//! Upstream gateway: cached authentication plus classified calls.

use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use palisade_cache::TtlCache;
use palisade_core::{ServiceError, ServiceResult, UpstreamConfig};

use crate::classify::classify;
use crate::transport::{RpcError, Transport};

/// Cached authentication tokens outlive the general TTL policy: the
/// upstream session id stays valid far longer than result data stays
/// interesting.
const AUTH_TOKEN_TTL_SECS: i64 = 3600;

/// Cache key for server version metadata.
const SERVER_VERSION_KEY: &str = "server_version";

/// Stateless wrapper around one remote-procedure channel.
///
/// Authenticates on demand with a cached token, invokes upstream methods,
/// and classifies every transport failure into a [`ServiceError`] exactly
/// once before it reaches a caller. The cache lock is never held while a
/// call is in flight; lookups happen before dispatch and stores after.
pub struct UpstreamGateway {
    transport: Arc<dyn Transport>,
    cache: Arc<TtlCache>,
    config: UpstreamConfig,
}

impl UpstreamGateway {
    /// Create a gateway over a transport and a shared cache.
    pub fn new(transport: Arc<dyn Transport>, cache: Arc<TtlCache>, config: UpstreamConfig) -> Self {
        Self {
            transport,
            cache,
            config,
        }
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    fn auth_cache_key(&self) -> String {
        format!("auth:{}:{}", self.config.username, self.config.database)
    }

    /// Authenticate with the upstream, reusing a cached token when one is
    /// resident and unexpired.
    ///
    /// A falsy identity from the upstream means the credentials were
    /// rejected; that is `AuthFailed` and will not succeed on retry.
    pub async fn authenticate(&self) -> ServiceResult<i64> {
        let cache_key = self.auth_cache_key();
        if let Some(uid) = self.cache.get(&cache_key).and_then(|v| v.as_i64()) {
            debug!(uid, "using cached authentication token");
            return Ok(uid);
        }

        info!("authenticating with upstream");
        let identity = self
            .transport
            .authenticate(
                &self.config.database,
                &self.config.username,
                self.config.credential(),
                &json!({}),
            )
            .await
            .map_err(|err| match err {
                // A fault during authentication is a credential rejection,
                // not a generic upstream fault.
                RpcError::Fault { message } => ServiceError::auth_failed(message),
                other => classify(other),
            })?;

        let uid = identity
            .as_i64()
            .filter(|uid| *uid > 0)
            .ok_or_else(|| {
                ServiceError::auth_failed("Authentication failed. Check your credentials.")
            })?;

        self.cache
            .set_with_ttl(cache_key, json!(uid), AUTH_TOKEN_TTL_SECS);
        info!(uid, "authentication successful");
        Ok(uid)
    }

    /// Execute `method` on `model`, authenticating first.
    pub async fn call(
        &self,
        model: &str,
        method: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> ServiceResult<Value> {
        let uid = self.authenticate().await?;

        debug!(model, method, "executing upstream method");
        self.transport
            .execute_kw(
                &self.config.database,
                uid,
                self.config.credential(),
                model,
                method,
                args,
                kwargs,
            )
            .await
            .map_err(classify)
    }

    /// Fetch server version metadata, cached alongside the other
    /// slow-moving upstream facts.
    pub async fn server_version(&self) -> ServiceResult<Value> {
        if let Some(cached) = self.cache.get(SERVER_VERSION_KEY) {
            return Ok(cached);
        }

        let version = self
            .transport
            .server_version()
            .await
            .map_err(classify)?;
        self.cache
            .set_with_ttl(SERVER_VERSION_KEY, version.clone(), AUTH_TOKEN_TTL_SECS);
        Ok(version)
    }
}

impl std::fmt::Debug for UpstreamGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamGateway")
            .field("database", &self.config.database)
            .field("username", &self.config.username)
            .finish()
    }
}

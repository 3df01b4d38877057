//! Request validation against cached upstream metadata.
//!
//! The validator answers three questions before any operation is allowed
//! to touch the upstream: does the model exist, do the referenced fields
//! exist on it, and is the domain filter well-formed. Model and field
//! metadata come through the gateway and are cached alongside the result
//! data, so validation is usually free after the first call.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::debug;

use palisade_cache::{build_key, TtlCache, METADATA_TTL_SECS};
use palisade_core::{
    normalize_domain, normalize_fields, DomainClause, RawDomain, RawFields, ServiceError,
    ServiceResult,
};
use palisade_rpc::UpstreamGateway;

/// The model registry: the bootstrap model used to enumerate all others.
/// It is exempt from self-validation, otherwise checking it would recurse
/// into another registry lookup.
pub const MODEL_REGISTRY: &str = "ir.model";

/// Cache key for the unfiltered model registry listing.
const MODEL_LIST_KEY: &str = "model_list";

/// Where validation metadata came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Metadata was resident in the cache.
    Hit,
    /// Metadata was fetched from the upstream.
    Miss,
    /// No lookup was necessary.
    Skipped,
}

/// Validates models, fields, domains, and method names.
pub struct RequestValidator {
    gateway: Arc<UpstreamGateway>,
    cache: Arc<TtlCache>,
}

impl RequestValidator {
    pub fn new(gateway: Arc<UpstreamGateway>, cache: Arc<TtlCache>) -> Self {
        Self { gateway, cache }
    }

    /// Fetch the model registry listing, cached under a fixed key.
    pub async fn model_registry(&self) -> ServiceResult<(Value, CacheStatus)> {
        if let Some(cached) = self.cache.get(MODEL_LIST_KEY) {
            return Ok((cached, CacheStatus::Hit));
        }

        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), json!(["model", "name", "transient"]));
        let listing = self
            .gateway
            .call(MODEL_REGISTRY, "search_read", &[json!([])], &kwargs)
            .await?;

        self.cache
            .set_with_ttl(MODEL_LIST_KEY, listing.clone(), METADATA_TTL_SECS);
        Ok((listing, CacheStatus::Miss))
    }

    /// Fetch the full field-definition map for a model, cached per model.
    pub async fn field_map(&self, model: &str) -> ServiceResult<(Value, CacheStatus)> {
        let key = build_key(
            "fields_get",
            &[json!(model), Value::Null, Value::Null],
            &BTreeMap::new(),
        )?;
        if let Some(cached) = self.cache.get(&key) {
            return Ok((cached, CacheStatus::Hit));
        }

        let fields = self
            .gateway
            .call(model, "fields_get", &[], &Map::new())
            .await?;

        self.cache.set_with_ttl(key, fields.clone(), METADATA_TTL_SECS);
        Ok((fields, CacheStatus::Miss))
    }

    /// Check that `model` exists upstream.
    pub async fn validate_model(&self, model: &str) -> ServiceResult<CacheStatus> {
        if model == MODEL_REGISTRY {
            return Ok(CacheStatus::Skipped);
        }

        let (listing, status) = self.model_registry().await?;
        let exists = listing
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .any(|m| m.get("model").and_then(Value::as_str) == Some(model))
            })
            .unwrap_or(false);

        if exists {
            Ok(status)
        } else {
            debug!(model, "model validation failed");
            Err(ServiceError::invalid_entity(model))
        }
    }

    /// Check that every requested field exists on `model`, reporting all
    /// unknown names in a single error.
    pub async fn validate_fields(
        &self,
        model: &str,
        fields: &[String],
    ) -> ServiceResult<CacheStatus> {
        if fields.is_empty() {
            return Ok(CacheStatus::Skipped);
        }

        let (field_map, status) = self.field_map(model).await?;
        let known = field_map.as_object();
        let missing: Vec<String> = fields
            .iter()
            .filter(|field| !known.is_some_and(|map| map.contains_key(*field)))
            .cloned()
            .collect();

        if missing.is_empty() {
            Ok(status)
        } else {
            debug!(model, ?missing, "field validation failed");
            Err(ServiceError::invalid_fields(model, &missing))
        }
    }

    /// Resolve and shape-check a raw domain filter.
    pub fn validate_domain(&self, raw: Option<RawDomain>) -> ServiceResult<Vec<DomainClause>> {
        normalize_domain(raw)
    }

    /// Resolve a raw field list without checking it against a model.
    pub fn resolve_fields(&self, raw: Option<RawFields>) -> ServiceResult<Option<Vec<String>>> {
        normalize_fields(raw)
    }

    /// Reject empty method names before any network call.
    pub fn validate_method(&self, method: &str) -> ServiceResult<()> {
        if method.trim().is_empty() {
            return Err(ServiceError::invalid_method("Method name must not be empty"));
        }
        Ok(())
    }
}

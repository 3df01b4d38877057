//! The validating proxy service.
//!
//! Every public operation runs the same sequence: validate inputs against
//! cached upstream metadata, compute the fingerprint, try the cache, fall
//! through to the gateway on a miss, and wrap the outcome in the uniform
//! envelope. Write operations trigger the (configurable) invalidation
//! policy after a successful upstream call.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use palisade_cache::{build_key, TtlCache, METADATA_TTL_SECS};
use palisade_core::{
    domain_to_value, CacheOutcome, DomainClause, Envelope, ResponseMeta, ServiceError,
    ServiceResult,
};
use palisade_rpc::UpstreamGateway;

use crate::types::{
    CreateRequest, DeleteRequest, ExecuteRequest, ListModelsRequest, ModelFieldsRequest,
    ModelInfoRequest, ReadRequest, SearchCountRequest, SearchReadRequest, SearchRequest,
    UpdateRequest,
};
use crate::validator::{CacheStatus, RequestValidator, MODEL_REGISTRY};

/// Orchestrates validator, cache, and gateway for every public operation.
///
/// All shared state is `Arc`-injected by the composition root; tests
/// build fresh instances per case. The service never panics on request
/// data and never lets a raw error cross its boundary.
pub struct ProxyService {
    gateway: Arc<UpstreamGateway>,
    cache: Arc<TtlCache>,
    validator: RequestValidator,
}

impl ProxyService {
    pub fn new(gateway: Arc<UpstreamGateway>, cache: Arc<TtlCache>) -> Self {
        let validator = RequestValidator::new(Arc::clone(&gateway), Arc::clone(&cache));
        Self {
            gateway,
            cache,
            validator,
        }
    }

    pub fn validator(&self) -> &RequestValidator {
        &self.validator
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    // ========================================================================
    // PUBLIC OPERATIONS
    // ========================================================================

    /// Search for record ids matching a domain.
    pub async fn search(&self, request: SearchRequest) -> Envelope {
        let result = self.do_search(request).await;
        self.envelope("search", result)
    }

    /// Search and read matching records in one call.
    pub async fn search_read(&self, request: SearchReadRequest) -> Envelope {
        let result = self.do_search_read(request).await;
        self.envelope("search_read", result)
    }

    /// Count records matching a domain.
    pub async fn search_count(&self, request: SearchCountRequest) -> Envelope {
        let result = self.do_search_count(request).await;
        self.envelope("search_count", result)
    }

    /// Read records by id.
    pub async fn read(&self, request: ReadRequest) -> Envelope {
        let result = self.do_read(request).await;
        self.envelope("read", result)
    }

    /// Create one or more records.
    pub async fn create(&self, request: CreateRequest) -> Envelope {
        let result = self.do_create(request).await;
        self.envelope("create", result)
    }

    /// Update records by id.
    pub async fn update(&self, request: UpdateRequest) -> Envelope {
        let result = self.do_update(request).await;
        self.envelope("update", result)
    }

    /// Delete records by id.
    pub async fn delete(&self, request: DeleteRequest) -> Envelope {
        let result = self.do_delete(request).await;
        self.envelope("delete", result)
    }

    /// Execute an arbitrary model method. Never cached: the method may
    /// mutate upstream state.
    pub async fn execute_method(&self, request: ExecuteRequest) -> Envelope {
        let result = self.do_execute_method(request).await;
        self.envelope("execute_method", result)
    }

    /// List available models, optionally filtered.
    pub async fn list_models(&self, request: ListModelsRequest) -> Envelope {
        let result = self.do_list_models(request).await;
        self.envelope("list_models", result)
    }

    /// Fetch field definitions for a model.
    pub async fn model_fields(&self, request: ModelFieldsRequest) -> Envelope {
        let result = self.do_model_fields(request).await;
        self.envelope("model_fields", result)
    }

    /// Fetch comprehensive information about a model.
    pub async fn model_info(&self, request: ModelInfoRequest) -> Envelope {
        let result = self.do_model_info(request).await;
        self.envelope("model_info", result)
    }

    /// Fetch upstream server version metadata.
    pub async fn server_info(&self) -> Envelope {
        let result = self.do_server_info().await;
        self.envelope("server_info", result)
    }

    // ========================================================================
    // OPERATION BODIES
    // ========================================================================

    async fn do_search(
        &self,
        request: SearchRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;
        let domain = self.validator.validate_domain(request.domain)?;
        self.validator
            .validate_fields(&request.model, &clause_fields(&domain))
            .await?;

        let domain_value = domain_to_value(&domain);
        let offset = request.offset.unwrap_or(0);
        let mut kwargs = Map::new();
        kwargs.insert("offset".to_string(), json!(offset));
        if let Some(limit) = request.limit {
            kwargs.insert("limit".to_string(), json!(limit));
        }
        if let Some(order) = &request.order {
            kwargs.insert("order".to_string(), json!(order));
        }

        // The domain is pre-rendered to text for the fingerprint so clause
        // order survives; the builder only normalizes top-level sequences.
        let key_args = [
            json!(request.model),
            json!(domain_value.to_string()),
            json!(offset),
            json!(request.limit),
            json!(request.order),
        ];
        self.cached_call(
            "search",
            &key_args,
            &request.model,
            "search",
            vec![domain_value],
            kwargs,
            self.cache.default_ttl(),
        )
        .await
    }

    async fn do_search_read(
        &self,
        request: SearchReadRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;
        let domain = self.validator.validate_domain(request.domain)?;
        self.validator
            .validate_fields(&request.model, &clause_fields(&domain))
            .await?;
        let fields = self.validator.resolve_fields(request.fields)?;
        if let Some(fields) = &fields {
            self.validator.validate_fields(&request.model, fields).await?;
        }

        let domain_value = domain_to_value(&domain);
        let offset = request.offset.unwrap_or(0);
        let mut kwargs = Map::new();
        kwargs.insert("offset".to_string(), json!(offset));
        if let Some(fields) = &fields {
            kwargs.insert("fields".to_string(), json!(fields));
        }
        if let Some(limit) = request.limit {
            kwargs.insert("limit".to_string(), json!(limit));
        }
        if let Some(order) = &request.order {
            kwargs.insert("order".to_string(), json!(order));
        }

        let key_args = [
            json!(request.model),
            json!(domain_value.to_string()),
            json!(fields),
            json!(offset),
            json!(request.limit),
            json!(request.order),
        ];
        let (records, outcome) = self
            .cached_call(
                "search_read",
                &key_args,
                &request.model,
                "search_read",
                vec![domain_value],
                kwargs,
                self.cache.default_ttl(),
            )
            .await?;

        let count = records.as_array().map(Vec::len).unwrap_or(0);
        Ok((json!({"records": records, "count": count}), outcome))
    }

    async fn do_search_count(
        &self,
        request: SearchCountRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;
        let domain = self.validator.validate_domain(request.domain)?;
        self.validator
            .validate_fields(&request.model, &clause_fields(&domain))
            .await?;

        let domain_value = domain_to_value(&domain);
        let key_args = [json!(request.model), json!(domain_value.to_string())];
        let (count, outcome) = self
            .cached_call(
                "search_count",
                &key_args,
                &request.model,
                "search_count",
                vec![domain_value],
                Map::new(),
                self.cache.default_ttl(),
            )
            .await?;

        Ok((json!({"count": count}), outcome))
    }

    async fn do_read(
        &self,
        request: ReadRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;
        let fields = self.validator.resolve_fields(request.fields)?;
        if let Some(fields) = &fields {
            self.validator.validate_fields(&request.model, fields).await?;
        }

        let (ids, single) = request.ids.into_parts();
        let mut sorted_ids = ids.clone();
        sorted_ids.sort_unstable();

        let mut kwargs = Map::new();
        if let Some(fields) = &fields {
            kwargs.insert("fields".to_string(), json!(fields));
        }

        let key_args = [json!(request.model), json!(sorted_ids), json!(fields)];
        let (result, outcome) = self
            .cached_call(
                "read",
                &key_args,
                &request.model,
                "read",
                vec![json!(ids)],
                kwargs,
                self.cache.default_ttl(),
            )
            .await?;

        Ok((unwrap_single(result, single), outcome))
    }

    async fn do_create(
        &self,
        request: CreateRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;
        let (values, single) = request.values.into_parts();
        self.validator
            .validate_fields(&request.model, &value_fields(&values))
            .await?;

        info!(model = %request.model, count = values.len(), "creating records");
        let result = self
            .gateway
            .call(&request.model, "create", &[json!(values)], &Map::new())
            .await?;

        self.invalidate_after_write(&request.model);
        Ok((unwrap_single(result, single), None))
    }

    async fn do_update(
        &self,
        request: UpdateRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;
        let field_names: Vec<String> = request.values.keys().cloned().collect();
        self.validator
            .validate_fields(&request.model, &field_names)
            .await?;

        let (ids, _) = request.ids.into_parts();
        info!(model = %request.model, count = ids.len(), "updating records");
        let result = self
            .gateway
            .call(
                &request.model,
                "write",
                &[json!(ids), json!(request.values)],
                &Map::new(),
            )
            .await?;

        self.invalidate_after_write(&request.model);
        Ok((result, None))
    }

    async fn do_delete(
        &self,
        request: DeleteRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;

        let (ids, _) = request.ids.into_parts();
        info!(model = %request.model, count = ids.len(), "deleting records");
        let result = self
            .gateway
            .call(&request.model, "unlink", &[json!(ids)], &Map::new())
            .await?;

        self.invalidate_after_write(&request.model);
        Ok((result, None))
    }

    async fn do_execute_method(
        &self,
        request: ExecuteRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;
        self.validator.validate_method(&request.method)?;

        let mut args = request.args;
        if let Some(ids) = request.ids {
            if !ids.is_empty() {
                args.insert(0, json!(ids));
            }
        }

        let mut kwargs = request.kwargs;
        if let Some(context) = request.context {
            kwargs
                .entry("context".to_string())
                .or_insert_with(|| json!(context));
        }

        info!(model = %request.model, method = %request.method, "executing model method");
        let result = self
            .gateway
            .call(&request.model, &request.method, &args, &kwargs)
            .await?;
        Ok((result, None))
    }

    async fn do_list_models(
        &self,
        request: ListModelsRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        let (listing, status) = self.validator.model_registry().await?;
        let models = match listing {
            Value::Array(models) => models,
            _ => Vec::new(),
        };

        let needle = request.search.as_deref().map(str::to_lowercase);
        let filtered: Vec<Value> = models
            .into_iter()
            .filter(|model| {
                if !request.transient
                    && model
                        .get("transient")
                        .and_then(Value::as_bool)
                        .unwrap_or(false)
                {
                    return false;
                }
                if let Some(needle) = &needle {
                    let technical = model
                        .get("model")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_lowercase();
                    let display = model
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_lowercase();
                    if !technical.contains(needle) && !display.contains(needle) {
                        return false;
                    }
                }
                true
            })
            .collect();

        let count = filtered.len();
        let outcome = self.metadata_outcome(status);
        Ok((json!({"models": filtered, "count": count}), outcome))
    }

    async fn do_model_fields(
        &self,
        request: ModelFieldsRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;
        let fields = self.validator.resolve_fields(request.fields)?;

        let mut kwargs = Map::new();
        if let Some(fields) = &fields {
            kwargs.insert("allfields".to_string(), json!(fields));
        }
        if let Some(attributes) = &request.attributes {
            kwargs.insert("attributes".to_string(), json!(attributes));
        }

        // A full-map request shares its fingerprint with the validator's
        // own metadata lookups, so either side can warm the other.
        let key_args = [
            json!(request.model),
            json!(fields),
            json!(request.attributes),
        ];
        self.cached_call(
            "fields_get",
            &key_args,
            &request.model,
            "fields_get",
            Vec::new(),
            kwargs,
            METADATA_TTL_SECS,
        )
        .await
    }

    async fn do_model_info(
        &self,
        request: ModelInfoRequest,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        self.validator.validate_model(&request.model).await?;

        let mut kwargs = Map::new();
        kwargs.insert(
            "fields".to_string(),
            json!(["name", "info", "transient", "modules"]),
        );
        let domain = json!([["model", "=", request.model]]);
        let key_args = [json!(request.model)];
        let (rows, outcome) = self
            .cached_call(
                "model_info",
                &key_args,
                MODEL_REGISTRY,
                "search_read",
                vec![domain],
                kwargs,
                METADATA_TTL_SECS,
            )
            .await?;

        let info = rows
            .as_array()
            .and_then(|rows| rows.first())
            .cloned()
            .ok_or_else(|| ServiceError::invalid_entity(&request.model))?;

        let (field_map, _) = self.validator.field_map(&request.model).await?;
        let field_count = field_map.as_object().map(Map::len).unwrap_or(0);

        Ok((
            json!({
                "model": request.model,
                "name": info.get("name"),
                "transient": info.get("transient").and_then(Value::as_bool).unwrap_or(false),
                "modules": info.get("modules"),
                "fields": field_map,
                "field_count": field_count,
            }),
            outcome,
        ))
    }

    async fn do_server_info(&self) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        let version = self.gateway.server_version().await?;
        Ok((json!({"version": version}), None))
    }

    // ========================================================================
    // SHARED MACHINERY
    // ========================================================================

    /// Fingerprint, cache lookup, upstream call, store. The cache lock is
    /// only ever taken before dispatch and after the result arrives.
    async fn cached_call(
        &self,
        fingerprint_op: &str,
        key_args: &[Value],
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
        ttl_secs: i64,
    ) -> ServiceResult<(Value, Option<CacheOutcome>)> {
        let key = build_key(fingerprint_op, key_args, &BTreeMap::new())?;

        if let Some(hit) = self.cache.get(&key) {
            return Ok((hit, Some(CacheOutcome::Hit)));
        }

        let result = self.gateway.call(model, method, &args, &kwargs).await?;

        if self.cache.enabled() {
            self.cache.set_with_ttl(key, result.clone(), ttl_secs);
            Ok((result, Some(CacheOutcome::Miss)))
        } else {
            Ok((result, None))
        }
    }

    /// Post-write invalidation. The default preserves upstream behavior:
    /// nothing is evicted and stale reads age out via TTL. The
    /// `invalidate_on_write` flag clears the whole cache instead; keys are
    /// not tracked per model, so the broad sweep is the only safe option.
    fn invalidate_after_write(&self, model: &str) {
        if self.cache.settings().invalidate_on_write {
            let removed = self.cache.clear();
            info!(model, removed, "cache cleared after write");
        } else {
            debug!(model, "write completed without cache invalidation");
        }
    }

    fn metadata_outcome(&self, status: CacheStatus) -> Option<CacheOutcome> {
        if !self.cache.enabled() {
            return None;
        }
        match status {
            CacheStatus::Hit => Some(CacheOutcome::Hit),
            CacheStatus::Miss => Some(CacheOutcome::Miss),
            CacheStatus::Skipped => None,
        }
    }

    fn base_meta(&self) -> ResponseMeta {
        let config = self.gateway.config();
        ResponseMeta::new(config.version.clone(), config.endpoint_mode())
    }

    fn envelope(
        &self,
        operation: &str,
        result: ServiceResult<(Value, Option<CacheOutcome>)>,
    ) -> Envelope {
        match result {
            Ok((data, outcome)) => {
                let mut meta = self.base_meta();
                meta.cache = outcome;
                Envelope::success(data, meta)
            }
            Err(error) => {
                warn!(
                    operation,
                    kind = %error.kind,
                    message = %error.message,
                    "operation failed"
                );
                Envelope::failure(error, self.base_meta())
            }
        }
    }
}

impl std::fmt::Debug for ProxyService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyService")
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Collect the distinct field names referenced by a domain's clauses.
fn clause_fields(domain: &[DomainClause]) -> Vec<String> {
    let mut fields: Vec<String> = domain.iter().map(|clause| clause.field.clone()).collect();
    fields.sort();
    fields.dedup();
    fields
}

/// Collect the distinct field names used across creation value maps.
fn value_fields(values: &[Map<String, Value>]) -> Vec<String> {
    let mut fields: Vec<String> = values
        .iter()
        .flat_map(|map| map.keys().cloned())
        .collect();
    fields.sort();
    fields.dedup();
    fields
}

/// Mirror the caller's scalar/sequence shape: a scalar input unwraps a
/// one-element sequence result.
fn unwrap_single(result: Value, single: bool) -> Value {
    if !single {
        return result;
    }
    match result {
        Value::Array(mut items) if !items.is_empty() => items.remove(0),
        other => other,
    }
}

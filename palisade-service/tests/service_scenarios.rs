//! End-to-end scenarios for the proxy service against a scripted upstream.
//!
//! The mock transport keeps a tiny in-memory record store and counts every
//! upstream call, so the tests can assert both behavior and traffic: what
//! reached the wire, what was answered from the cache, and what was
//! rejected before any network dispatch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use palisade_cache::TtlCache;
use palisade_core::{CacheOutcome, CacheSettings, ErrorKind, UpstreamConfig};
use palisade_rpc::{RpcError, Transport, UpstreamGateway};
use palisade_service::{
    CreateRequest, DeleteRequest, ExecuteRequest, ListModelsRequest, ModelFieldsRequest,
    ModelInfoRequest, ProxyService, ReadRequest, RecordIds, RecordValues, SearchCountRequest,
    SearchReadRequest, SearchRequest, UpdateRequest,
};

// ============================================================================
// SCRIPTED UPSTREAM
// ============================================================================

struct MockUpstream {
    auth_calls: AtomicUsize,
    execute_log: Mutex<Vec<(String, String)>>,
    records: Mutex<HashMap<i64, Map<String, Value>>>,
    next_id: AtomicI64,
}

impl MockUpstream {
    fn new() -> Self {
        let mut records = HashMap::new();
        records.insert(1, object(&[("name", json!("Acme")), ("email", json!("acme@example.com"))]));
        records.insert(2, object(&[("name", json!("Globex")), ("email", json!("globex@example.com"))]));

        Self {
            auth_calls: AtomicUsize::new(0),
            execute_log: Mutex::new(Vec::new()),
            records: Mutex::new(records),
            next_id: AtomicI64::new(100),
        }
    }

    fn calls_to(&self, model: &str, method: &str) -> usize {
        self.execute_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, meth)| m == model && meth == method)
            .count()
    }

    fn registry() -> Value {
        json!([
            {"id": 1, "model": "res.partner", "name": "Contact", "transient": false},
            {"id": 2, "model": "res.partner.wizard", "name": "Partner Wizard", "transient": true},
        ])
    }

    fn partner_fields() -> Value {
        json!({
            "id": {"type": "integer", "string": "ID"},
            "name": {"type": "char", "string": "Name", "required": true},
            "email": {"type": "char", "string": "Email"},
            "active": {"type": "boolean", "string": "Active"},
        })
    }

    fn record_view(&self, id: i64, fields: Option<&Vec<String>>) -> Option<Value> {
        let records = self.records.lock().unwrap();
        let stored = records.get(&id)?;
        let mut view = Map::new();
        view.insert("id".to_string(), json!(id));
        match fields {
            Some(fields) => {
                for field in fields {
                    if field != "id" {
                        view.insert(
                            field.clone(),
                            stored.get(field).cloned().unwrap_or(Value::Bool(false)),
                        );
                    }
                }
            }
            None => {
                for (key, value) in stored.iter() {
                    view.insert(key.clone(), value.clone());
                }
            }
        }
        Some(Value::Object(view))
    }
}

fn object(entries: &[(&str, Value)]) -> Map<String, Value> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn requested_fields(kwargs: &Map<String, Value>) -> Option<Vec<String>> {
    kwargs.get("fields").and_then(Value::as_array).map(|fields| {
        fields
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}

#[async_trait]
impl Transport for MockUpstream {
    async fn authenticate(
        &self,
        _database: &str,
        _username: &str,
        _credential: &str,
        _extra: &Value,
    ) -> Result<Value, RpcError> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!(7))
    }

    async fn execute_kw(
        &self,
        _database: &str,
        _uid: i64,
        _credential: &str,
        model: &str,
        method: &str,
        args: &[Value],
        kwargs: &Map<String, Value>,
    ) -> Result<Value, RpcError> {
        self.execute_log
            .lock()
            .unwrap()
            .push((model.to_string(), method.to_string()));

        match (model, method) {
            ("ir.model", "search_read") => {
                let domain = args.first().and_then(Value::as_array);
                let unfiltered = domain.map(Vec::is_empty).unwrap_or(true);
                if unfiltered {
                    return Ok(Self::registry());
                }
                // model_info lookup: [["model", "=", name]]
                let wanted = domain
                    .and_then(|clauses| clauses.first())
                    .and_then(Value::as_array)
                    .and_then(|clause| clause.get(2))
                    .and_then(Value::as_str);
                if wanted == Some("res.partner") {
                    Ok(json!([{
                        "id": 1,
                        "name": "Contact",
                        "info": "Business partners",
                        "transient": false,
                        "modules": "base",
                    }]))
                } else {
                    Ok(json!([]))
                }
            }
            ("res.partner", "fields_get") => Ok(Self::partner_fields()),
            ("res.partner.wizard", "fields_get") => Ok(json!({
                "id": {"type": "integer", "string": "ID"},
                "name": {"type": "char", "string": "Name"},
            })),
            ("ir.model", "fields_get") => Ok(json!({
                "model": {"type": "char", "string": "Model"},
                "name": {"type": "char", "string": "Name"},
                "transient": {"type": "boolean", "string": "Transient"},
            })),
            ("res.partner", "search") => {
                let mut ids: Vec<i64> = self.records.lock().unwrap().keys().copied().collect();
                ids.sort_unstable();
                Ok(json!(ids))
            }
            ("res.partner", "search_count") => {
                Ok(json!(self.records.lock().unwrap().len()))
            }
            ("res.partner", "search_read") => {
                let fields = requested_fields(kwargs);
                let mut ids: Vec<i64> = self.records.lock().unwrap().keys().copied().collect();
                ids.sort_unstable();
                let rows: Vec<Value> = ids
                    .into_iter()
                    .filter_map(|id| self.record_view(id, fields.as_ref()))
                    .collect();
                Ok(json!(rows))
            }
            ("res.partner", "read") => {
                let ids: Vec<i64> = args
                    .first()
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                let fields = requested_fields(kwargs);
                let rows: Vec<Value> = ids
                    .into_iter()
                    .filter_map(|id| self.record_view(id, fields.as_ref()))
                    .collect();
                Ok(json!(rows))
            }
            ("res.partner", "create") => {
                let values = args
                    .first()
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let mut created = Vec::new();
                let mut records = self.records.lock().unwrap();
                for value in values {
                    let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                    if let Value::Object(map) = value {
                        records.insert(id, map);
                    }
                    created.push(id);
                }
                Ok(json!(created))
            }
            ("res.partner", "write") => {
                let ids: Vec<i64> = args
                    .first()
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                let values = args.get(1).and_then(Value::as_object).cloned().unwrap_or_default();
                let mut records = self.records.lock().unwrap();
                for id in ids {
                    if let Some(record) = records.get_mut(&id) {
                        for (key, value) in values.iter() {
                            record.insert(key.clone(), value.clone());
                        }
                    }
                }
                Ok(json!(true))
            }
            ("res.partner", "unlink") => {
                let ids: Vec<i64> = args
                    .first()
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
                    .unwrap_or_default();
                let mut records = self.records.lock().unwrap();
                for id in ids {
                    records.remove(&id);
                }
                Ok(json!(true))
            }
            ("res.partner", "name_search") => Ok(json!([[1, "Acme"]])),
            (model, method) => Err(RpcError::Fault {
                message: format!("'{}' object has no attribute '{}'", model, method),
            }),
        }
    }

    async fn server_version(&self) -> Result<Value, RpcError> {
        Ok(json!({"server_version": "18.0", "protocol_version": 1}))
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

fn config_fixture() -> UpstreamConfig {
    UpstreamConfig {
        url: "https://erp.example.com".to_string(),
        database: "prod".to_string(),
        username: "svc@example.com".to_string(),
        password: Some("hunter2".to_string()),
        api_key: None,
        timeout_secs: 120,
        verify_ssl: true,
        version: "18.0".to_string(),
    }
}

fn build_service(settings: CacheSettings) -> (ProxyService, Arc<MockUpstream>) {
    let transport = Arc::new(MockUpstream::new());
    let cache = Arc::new(TtlCache::new(settings));
    let gateway = Arc::new(UpstreamGateway::new(
        Arc::clone(&transport) as Arc<dyn Transport>,
        Arc::clone(&cache),
        config_fixture(),
    ));
    (ProxyService::new(gateway, cache), transport)
}

fn default_service() -> (ProxyService, Arc<MockUpstream>) {
    build_service(CacheSettings::default())
}

fn acme_domain() -> Option<palisade_core::RawDomain> {
    Some(palisade_core::RawDomain::Clauses(vec![json!([
        "name", "=", "Acme"
    ])]))
}

// ============================================================================
// SCENARIOS
// ============================================================================

#[tokio::test]
async fn test_repeated_search_is_served_from_cache() {
    let (service, upstream) = default_service();

    let request = SearchRequest {
        model: "res.partner".to_string(),
        domain: acme_domain(),
        offset: None,
        limit: None,
        order: None,
    };

    let first = service.search(request.clone()).await;
    assert!(first.ok);
    assert_eq!(first.meta.cache, Some(CacheOutcome::Miss));

    let second = service.search(request).await;
    assert!(second.ok);
    assert_eq!(second.meta.cache, Some(CacheOutcome::Hit));
    assert_eq!(second.data, first.data);

    assert_eq!(upstream.calls_to("res.partner", "search"), 1);
}

#[tokio::test]
async fn test_authentication_is_cached_across_operations() {
    let (service, upstream) = default_service();

    let request = SearchRequest {
        model: "res.partner".to_string(),
        domain: None,
        offset: None,
        limit: None,
        order: None,
    };
    assert!(service.search(request.clone()).await.ok);
    assert!(service.search(request).await.ok);

    assert_eq!(upstream.auth_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_create_on_unknown_model_never_reaches_upstream() {
    let (service, upstream) = default_service();

    let response = service
        .create(CreateRequest {
            model: "res.unknown".to_string(),
            values: RecordValues::One(object(&[("name", json!("X"))])),
        })
        .await;

    assert!(!response.ok);
    let error = response.error.expect("failure envelope carries an error");
    assert_eq!(error.kind, ErrorKind::InvalidEntity);
    assert!(error.retryable);
    assert!(error.hint.contains("list_models"));
    assert_eq!(upstream.calls_to("res.unknown", "create"), 0);
}

#[tokio::test]
async fn test_field_validation_reports_every_missing_field_at_once() {
    let (service, upstream) = default_service();

    let response = service
        .search_read(SearchReadRequest {
            model: "res.partner".to_string(),
            domain: None,
            fields: Some(palisade_core::RawFields::List(vec![
                "name".to_string(),
                "missing1".to_string(),
                "missing2".to_string(),
            ])),
            offset: None,
            limit: None,
            order: None,
        })
        .await;

    assert!(!response.ok);
    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::InvalidField);
    assert!(error.message.contains("missing1"));
    assert!(error.message.contains("missing2"));
    assert!(error.hint.contains("model_fields"));
    assert_eq!(upstream.calls_to("res.partner", "search_read"), 0);
}

#[tokio::test]
async fn test_malformed_domain_is_rejected_before_dispatch() {
    let (service, upstream) = default_service();

    let response = service
        .search(SearchRequest {
            model: "res.partner".to_string(),
            domain: Some(palisade_core::RawDomain::Clauses(vec![json!(["name", "="])])),
            offset: None,
            limit: None,
            order: None,
        })
        .await;

    assert!(!response.ok);
    assert_eq!(response.error.unwrap().kind, ErrorKind::InvalidDomain);
    assert_eq!(upstream.calls_to("res.partner", "search"), 0);
}

#[tokio::test]
async fn test_disabled_cache_reflects_writes_immediately() {
    let (service, _upstream) = build_service(CacheSettings {
        enabled: false,
        ..CacheSettings::default()
    });

    let read = |ids: RecordIds| ReadRequest {
        model: "res.partner".to_string(),
        ids,
        fields: Some(palisade_core::RawFields::List(vec!["name".to_string()])),
    };

    let before = service.read(read(RecordIds::One(1))).await;
    assert!(before.ok);
    assert_eq!(before.data.as_ref().unwrap()["name"], json!("Acme"));
    assert!(before.meta.cache.is_none());

    let update = service
        .update(UpdateRequest {
            model: "res.partner".to_string(),
            ids: RecordIds::One(1),
            values: object(&[("name", json!("Renamed"))]),
        })
        .await;
    assert!(update.ok);

    let after = service.read(read(RecordIds::One(1))).await;
    assert!(after.ok);
    assert_eq!(after.data.as_ref().unwrap()["name"], json!("Renamed"));
    assert!(after.meta.cache.is_none());
}

#[tokio::test]
async fn test_stale_reads_persist_by_default_after_writes() {
    let (service, upstream) = default_service();

    let read = ReadRequest {
        model: "res.partner".to_string(),
        ids: RecordIds::One(1),
        fields: Some(palisade_core::RawFields::List(vec!["name".to_string()])),
    };

    let before = service.read(read.clone()).await;
    assert_eq!(before.data.as_ref().unwrap()["name"], json!("Acme"));

    service
        .update(UpdateRequest {
            model: "res.partner".to_string(),
            ids: RecordIds::One(1),
            values: object(&[("name", json!("Renamed"))]),
        })
        .await;

    // Default policy: no eviction on write. The cached read is stale
    // until its TTL lapses, and the upstream sees no second read.
    let after = service.read(read).await;
    assert_eq!(after.meta.cache, Some(CacheOutcome::Hit));
    assert_eq!(after.data.as_ref().unwrap()["name"], json!("Acme"));
    assert_eq!(upstream.calls_to("res.partner", "read"), 1);
}

#[tokio::test]
async fn test_invalidate_on_write_clears_cached_reads() {
    let (service, upstream) = build_service(CacheSettings {
        invalidate_on_write: true,
        ..CacheSettings::default()
    });

    let read = ReadRequest {
        model: "res.partner".to_string(),
        ids: RecordIds::One(1),
        fields: Some(palisade_core::RawFields::List(vec!["name".to_string()])),
    };

    service.read(read.clone()).await;
    service
        .update(UpdateRequest {
            model: "res.partner".to_string(),
            ids: RecordIds::One(1),
            values: object(&[("name", json!("Renamed"))]),
        })
        .await;

    let after = service.read(read).await;
    assert_eq!(after.meta.cache, Some(CacheOutcome::Miss));
    assert_eq!(after.data.as_ref().unwrap()["name"], json!("Renamed"));
    assert_eq!(upstream.calls_to("res.partner", "read"), 2);
}

#[tokio::test]
async fn test_read_mirrors_scalar_and_sequence_inputs() {
    let (service, _upstream) = default_service();

    let scalar = service
        .read(ReadRequest {
            model: "res.partner".to_string(),
            ids: RecordIds::One(1),
            fields: None,
        })
        .await;
    assert!(scalar.data.as_ref().unwrap().is_object());

    let sequence = service
        .read(ReadRequest {
            model: "res.partner".to_string(),
            ids: RecordIds::Many(vec![1, 2]),
            fields: None,
        })
        .await;
    let rows = sequence.data.as_ref().unwrap().as_array().unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn test_create_mirrors_scalar_and_sequence_inputs() {
    let (service, _upstream) = default_service();

    let scalar = service
        .create(CreateRequest {
            model: "res.partner".to_string(),
            values: RecordValues::One(object(&[("name", json!("Solo"))])),
        })
        .await;
    assert!(scalar.ok);
    assert!(scalar.data.as_ref().unwrap().is_i64());

    let sequence = service
        .create(CreateRequest {
            model: "res.partner".to_string(),
            values: RecordValues::Many(vec![
                object(&[("name", json!("A"))]),
                object(&[("name", json!("B"))]),
            ]),
        })
        .await;
    assert!(sequence.ok);
    assert_eq!(sequence.data.as_ref().unwrap().as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_create_rejects_unknown_value_fields() {
    let (service, upstream) = default_service();

    let response = service
        .create(CreateRequest {
            model: "res.partner".to_string(),
            values: RecordValues::One(object(&[("nme", json!("typo"))])),
        })
        .await;

    assert!(!response.ok);
    assert_eq!(response.error.unwrap().kind, ErrorKind::InvalidField);
    assert_eq!(upstream.calls_to("res.partner", "create"), 0);
}

#[tokio::test]
async fn test_delete_removes_records_upstream() {
    let (service, upstream) = default_service();

    let response = service
        .delete(DeleteRequest {
            model: "res.partner".to_string(),
            ids: RecordIds::Many(vec![2]),
        })
        .await;

    assert!(response.ok);
    assert_eq!(response.data, Some(json!(true)));
    assert_eq!(upstream.calls_to("res.partner", "unlink"), 1);
    assert!(!upstream.records.lock().unwrap().contains_key(&2));
}

#[tokio::test]
async fn test_execute_method_prepends_ids_and_passes_context() {
    let (service, upstream) = default_service();

    let response = service
        .execute_method(ExecuteRequest {
            model: "res.partner".to_string(),
            method: "name_search".to_string(),
            ids: None,
            args: vec![json!("Acme")],
            kwargs: Map::new(),
            context: Some(object(&[("lang", json!("en_US"))])),
        })
        .await;

    assert!(response.ok);
    assert_eq!(response.data, Some(json!([[1, "Acme"]])));
    assert_eq!(upstream.calls_to("res.partner", "name_search"), 1);
}

#[tokio::test]
async fn test_unknown_method_fault_narrows_to_invalid_method() {
    let (service, _upstream) = default_service();

    let response = service
        .execute_method(ExecuteRequest {
            model: "res.partner".to_string(),
            method: "frobnicate".to_string(),
            ids: None,
            args: Vec::new(),
            kwargs: Map::new(),
            context: None,
        })
        .await;

    assert!(!response.ok);
    let error = response.error.unwrap();
    assert_eq!(error.kind, ErrorKind::InvalidMethod);
    assert!(error.retryable);
}

#[tokio::test]
async fn test_blank_method_name_is_rejected_locally() {
    let (service, upstream) = default_service();

    let response = service
        .execute_method(ExecuteRequest {
            model: "res.partner".to_string(),
            method: "  ".to_string(),
            ids: None,
            args: Vec::new(),
            kwargs: Map::new(),
            context: None,
        })
        .await;

    assert!(!response.ok);
    assert_eq!(response.error.unwrap().kind, ErrorKind::InvalidMethod);
    assert_eq!(upstream.execute_log.lock().unwrap().len(), 1); // registry lookup only
}

#[tokio::test]
async fn test_list_models_filters_transient_and_search_term() {
    let (service, _upstream) = default_service();

    let all = service.list_models(ListModelsRequest::default()).await;
    assert_eq!(all.data.as_ref().unwrap()["count"], json!(1));

    let with_wizards = service
        .list_models(ListModelsRequest {
            transient: true,
            search: None,
        })
        .await;
    assert_eq!(with_wizards.data.as_ref().unwrap()["count"], json!(2));

    let searched = service
        .list_models(ListModelsRequest {
            transient: true,
            search: Some("wizard".to_string()),
        })
        .await;
    assert_eq!(searched.data.as_ref().unwrap()["count"], json!(1));
}

#[tokio::test]
async fn test_search_count_is_cached_like_other_reads() {
    let (service, upstream) = default_service();

    let request = SearchCountRequest {
        model: "res.partner".to_string(),
        domain: None,
    };

    let first = service.search_count(request.clone()).await;
    assert!(first.ok);
    assert_eq!(first.data.as_ref().unwrap()["count"], json!(2));
    assert_eq!(first.meta.cache, Some(CacheOutcome::Miss));

    let second = service.search_count(request).await;
    assert_eq!(second.meta.cache, Some(CacheOutcome::Hit));
    assert_eq!(upstream.calls_to("res.partner", "search_count"), 1);
}

#[tokio::test]
async fn test_model_fields_returns_and_caches_definitions() {
    let (service, upstream) = default_service();

    let request = ModelFieldsRequest {
        model: "res.partner".to_string(),
        fields: None,
        attributes: None,
    };

    let first = service.model_fields(request.clone()).await;
    assert!(first.ok);
    let data = first.data.as_ref().unwrap();
    assert!(data.get("name").is_some());
    assert!(data.get("email").is_some());
    assert_eq!(first.meta.cache, Some(CacheOutcome::Miss));

    let second = service.model_fields(request).await;
    assert_eq!(second.meta.cache, Some(CacheOutcome::Hit));
    assert_eq!(upstream.calls_to("res.partner", "fields_get"), 1);
}

#[tokio::test]
async fn test_model_info_composes_metadata_and_fields() {
    let (service, _upstream) = default_service();

    let response = service
        .model_info(ModelInfoRequest {
            model: "res.partner".to_string(),
        })
        .await;

    assert!(response.ok);
    let data = response.data.unwrap();
    assert_eq!(data["model"], json!("res.partner"));
    assert_eq!(data["name"], json!("Contact"));
    assert_eq!(data["field_count"], json!(4));
    assert_eq!(data["transient"], json!(false));
}

#[tokio::test]
async fn test_server_info_reports_upstream_version() {
    let (service, _upstream) = default_service();

    let response = service.server_info().await;
    assert!(response.ok);
    assert_eq!(
        response.data.unwrap()["version"]["server_version"],
        json!("18.0")
    );
    assert_eq!(response.meta.server_version, "18.0");
    assert_eq!(response.meta.endpoint_mode, "jsonrpc");
}

//! Request types for the public proxy operations.
//!
//! These are plain serde-friendly structs so the front end can map tool
//! arguments straight onto them. Scalar-or-sequence inputs are explicit
//! untagged unions; the service resolves them once and mirrors the shape
//! on the way out (scalar in, scalar out).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use palisade_core::{RawDomain, RawFields};

// ============================================================================
// SCALAR-OR-SEQUENCE UNIONS
// ============================================================================

/// One record id or a sequence of them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RecordIds {
    One(i64),
    Many(Vec<i64>),
}

impl RecordIds {
    /// Normalize to a vector, remembering whether the caller sent a
    /// scalar so the response can mirror it.
    pub fn into_parts(self) -> (Vec<i64>, bool) {
        match self {
            RecordIds::One(id) => (vec![id], true),
            RecordIds::Many(ids) => (ids, false),
        }
    }
}

/// One value map or a sequence of them, for record creation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RecordValues {
    One(Map<String, Value>),
    Many(Vec<Map<String, Value>>),
}

impl RecordValues {
    pub fn into_parts(self) -> (Vec<Map<String, Value>>, bool) {
        match self {
            RecordValues::One(values) => (vec![values], true),
            RecordValues::Many(values) => (values, false),
        }
    }
}

// ============================================================================
// OPERATION REQUESTS
// ============================================================================

/// Search for record ids matching a domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchRequest {
    pub model: String,
    #[serde(default)]
    pub domain: Option<RawDomain>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub order: Option<String>,
}

/// Search and read matching records in one call.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchReadRequest {
    pub model: String,
    #[serde(default)]
    pub domain: Option<RawDomain>,
    #[serde(default)]
    pub fields: Option<RawFields>,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub order: Option<String>,
}

/// Count records matching a domain.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchCountRequest {
    pub model: String,
    #[serde(default)]
    pub domain: Option<RawDomain>,
}

/// Read records by id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReadRequest {
    pub model: String,
    pub ids: RecordIds,
    #[serde(default)]
    pub fields: Option<RawFields>,
}

/// Create one or more records.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateRequest {
    pub model: String,
    pub values: RecordValues,
}

/// Update records by id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpdateRequest {
    pub model: String,
    pub ids: RecordIds,
    pub values: Map<String, Value>,
}

/// Delete records by id.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteRequest {
    pub model: String,
    pub ids: RecordIds,
}

/// Execute an arbitrary model method.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecuteRequest {
    pub model: String,
    pub method: String,
    /// Record ids the method applies to; prepended to the positional
    /// arguments when present.
    #[serde(default)]
    pub ids: Option<Vec<i64>>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    /// Optional execution context (lang, tz, ...), merged into kwargs.
    #[serde(default)]
    pub context: Option<Map<String, Value>>,
}

/// List available models, optionally filtered.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ListModelsRequest {
    /// Include transient (wizard) models.
    #[serde(default)]
    pub transient: bool,
    /// Case-insensitive substring filter on technical or display name.
    #[serde(default)]
    pub search: Option<String>,
}

/// Fetch field definitions for a model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelFieldsRequest {
    pub model: String,
    #[serde(default)]
    pub fields: Option<RawFields>,
    #[serde(default)]
    pub attributes: Option<Vec<String>>,
}

/// Fetch comprehensive information about a model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelInfoRequest {
    pub model: String,
}

//! Deterministic fingerprint keys for cacheable operations.
//!
//! A fingerprint is built from an operation name plus its normalized
//! arguments: top-level sequences are order-normalized by sorting, maps
//! are rendered as key-sorted pairs, and everything is joined with `|`.
//! Two semantically identical calls therefore always collide on the same
//! key.
//!
//! Normalization is shallow on purpose: sequences nested inside an
//! argument (for example the clauses inside an already-stringified domain)
//! keep their original order. Callers that want unordered clause sets to
//! collide must pre-sort them.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use palisade_core::{ErrorKind, ServiceError};

/// Delimiter joining fingerprint parts.
const DELIMITER: &str = "|";

/// Errors raised while building a fingerprint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FingerprintError {
    /// A sequence argument mixed kinds that have no defined ordering.
    #[error("Cannot sort sequence with incomparable elements: {detail}")]
    Incomparable { detail: String },
}

impl From<FingerprintError> for ServiceError {
    fn from(err: FingerprintError) -> Self {
        ServiceError::new(ErrorKind::Unknown, err.to_string())
    }
}

/// Build a cache key from an operation name and its arguments.
///
/// Pure function: no side effects, no I/O, deterministic for identical
/// inputs regardless of map insertion order.
pub fn build_key(
    operation: &str,
    positional: &[Value],
    named: &BTreeMap<String, Value>,
) -> Result<String, FingerprintError> {
    let mut parts = Vec::with_capacity(1 + positional.len() + named.len());
    parts.push(operation.to_string());

    for arg in positional {
        parts.push(render_part(arg)?);
    }

    // BTreeMap iteration is already key-sorted.
    for (name, value) in named {
        parts.push(format!("{}:{}", name, render_part(value)?));
    }

    Ok(parts.join(DELIMITER))
}

/// Render one top-level argument. Sequences are sorted here and only here.
fn render_part(value: &Value) -> Result<String, FingerprintError> {
    match value {
        Value::Array(items) => {
            let mut sorted = items.clone();
            try_sort(&mut sorted)?;
            let rendered: Vec<String> = sorted.iter().map(render_nested).collect();
            Ok(format!("[{}]", rendered.join(", ")))
        }
        other => Ok(render_nested(other)),
    }
}

/// Render a value without reordering anything inside it.
fn render_nested(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(render_nested).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            // serde_json maps iterate in insertion order by default, so
            // render pairs key-sorted for determinism.
            let mut pairs: Vec<(&String, &Value)> = map.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            let rendered: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}: {}", k, render_nested(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

/// Sort a sequence with cross-element comparison, failing on mixed kinds.
fn try_sort(items: &mut [Value]) -> Result<(), FingerprintError> {
    let mut first_err = None;
    items.sort_by(|a, b| match try_cmp(a, b) {
        Ok(ordering) => ordering,
        Err(err) => {
            first_err.get_or_insert(err);
            Ordering::Equal
        }
    });
    match first_err {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Compare two values of the same kind; mixed kinds and maps have no
/// defined ordering.
fn try_cmp(a: &Value, b: &Value) -> Result<Ordering, FingerprintError> {
    match (a, b) {
        (Value::Null, Value::Null) => Ok(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => Ok(x.cmp(y)),
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            Ok(x.partial_cmp(&y).unwrap_or(Ordering::Equal))
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        (Value::Array(xs), Value::Array(ys)) => {
            for (x, y) in xs.iter().zip(ys.iter()) {
                match try_cmp(x, y)? {
                    Ordering::Equal => continue,
                    unequal => return Ok(unequal),
                }
            }
            Ok(xs.len().cmp(&ys.len()))
        }
        _ => Err(FingerprintError::Incomparable {
            detail: format!("{} vs {}", kind_name(a), kind_name(b)),
        }),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}

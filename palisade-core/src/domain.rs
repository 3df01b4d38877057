//! Domain Filters and Raw Argument Unions
//!
//! A domain filter is an ordered sequence of `[field, operator, value]`
//! triples; an empty sequence matches every record. Callers hand filters
//! and field lists to the proxy in several textual shapes, so the raw
//! inputs are explicit tagged unions resolved exactly once, here, before
//! any other layer sees them.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

// ============================================================================
// DOMAIN CLAUSE
// ============================================================================

/// One filter clause: an ordered `(field, operator, value)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainClause {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl DomainClause {
    /// Coerce a raw JSON value into a clause.
    ///
    /// The value must be a 3-element array whose first element is a
    /// string field name.
    pub fn from_value(raw: &Value) -> ServiceResult<Self> {
        let parts = raw.as_array().ok_or_else(|| {
            ServiceError::invalid_domain(format!(
                "Domain clause must be a 3-element list, got: {}",
                raw
            ))
        })?;
        if parts.len() != 3 {
            return Err(ServiceError::invalid_domain(format!(
                "Domain clause must have exactly 3 elements, got {}",
                parts.len()
            )));
        }
        let field = parts[0].as_str().ok_or_else(|| {
            ServiceError::invalid_domain(format!(
                "Domain clause field name must be a string, got: {}",
                parts[0]
            ))
        })?;
        let operator = match &parts[1] {
            Value::String(op) => op.clone(),
            other => other.to_string(),
        };
        Ok(Self {
            field: field.to_string(),
            operator,
            value: parts[2].clone(),
        })
    }

    /// Render the clause back into its wire shape.
    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::String(self.field.clone()),
            Value::String(self.operator.clone()),
            self.value.clone(),
        ])
    }
}

/// Render a normalized domain into the wire-level array of clause arrays.
pub fn domain_to_value(clauses: &[DomainClause]) -> Value {
    Value::Array(clauses.iter().map(DomainClause::to_value).collect())
}

// ============================================================================
// RAW INPUT UNIONS
// ============================================================================

/// A domain filter as supplied by the caller: either structured clauses
/// or a JSON-encoded string of them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawDomain {
    JsonText(String),
    Clauses(Vec<Value>),
}

/// A field list as supplied by the caller: either a structured list or a
/// string holding a JSON array or comma-separated names.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RawFields {
    Text(String),
    List(Vec<String>),
}

/// Resolve a raw domain into normalized clauses.
///
/// `None` resolves to the match-all empty domain. JSON text must decode
/// to an array; every element must coerce via [`DomainClause::from_value`].
pub fn normalize_domain(raw: Option<RawDomain>) -> ServiceResult<Vec<DomainClause>> {
    let clauses = match raw {
        None => return Ok(Vec::new()),
        Some(RawDomain::Clauses(clauses)) => clauses,
        Some(RawDomain::JsonText(text)) => {
            let parsed: Value = serde_json::from_str(&text).map_err(|_| {
                ServiceError::invalid_domain(
                    "Domain must be a list of clauses or a JSON-encoded list",
                )
            })?;
            match parsed {
                Value::Array(clauses) => clauses,
                _ => {
                    return Err(ServiceError::invalid_domain(
                        "Domain must be a list of clauses",
                    ))
                }
            }
        }
    };

    clauses.iter().map(DomainClause::from_value).collect()
}

/// Resolve a raw field list into field names.
///
/// `None` means "all fields" and stays `None`. Text starting with `[` is
/// decoded as a JSON array of strings; any other text is split on commas.
pub fn normalize_fields(raw: Option<RawFields>) -> ServiceResult<Option<Vec<String>>> {
    let fields = match raw {
        None => return Ok(None),
        Some(RawFields::List(fields)) => fields,
        Some(RawFields::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.starts_with('[') {
                serde_json::from_str::<Vec<String>>(trimmed).map_err(|_| {
                    ServiceError::new(
                        crate::error::ErrorKind::InvalidField,
                        "Fields must be a list of strings or a JSON-encoded list",
                    )
                })?
            } else {
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            }
        }
    };

    Ok(Some(fields))
}

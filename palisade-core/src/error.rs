//! Error Types for Palisade Operations
//!
//! This module defines the structured error model shared by every layer:
//! - `ErrorKind` for categorizing failures
//! - `ServiceError` carrying a message, a remediation hint, and a
//!   retryability flag
//!
//! A `ServiceError` is constructed exactly once, at the failure site, and
//! is never re-classified on its way out. The proxy service converts it
//! into the error half of the response envelope unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// ERROR KIND ENUM
// ============================================================================

/// Error kinds for proxy operations.
///
/// The first four kinds reject malformed caller input locally, before any
/// network traffic. The remainder classify upstream failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Domain filter is not a sequence of 3-element clauses
    InvalidDomain,

    /// Named model does not exist upstream
    InvalidEntity,

    /// One or more requested fields do not exist on the model
    InvalidField,

    /// Method name is missing or rejected by the model
    InvalidMethod,

    /// Upstream rejected the credentials
    AuthFailed,

    /// Connection, timeout, or protocol failure reaching upstream
    TransportError,

    /// Upstream accepted the call but rejected it for a business reason
    UpstreamFault,

    /// Anything that escaped classification
    Unknown,
}

impl ErrorKind {
    /// Whether errors of this kind are worth retrying (after correcting
    /// the input where applicable). Only credential rejection is terminal:
    /// credentials do not become valid by retrying.
    pub fn retryable(&self) -> bool {
        !matches!(self, ErrorKind::AuthFailed)
    }

    /// Get the default remediation hint for this kind.
    pub fn default_hint(&self) -> &'static str {
        match self {
            ErrorKind::InvalidDomain => {
                "Provide the domain as a list of [field, operator, value] triples, e.g. [[\"name\", \"=\", \"Acme\"]]"
            }
            ErrorKind::InvalidEntity => {
                "Call the list_models operation to discover valid model names before retrying"
            }
            ErrorKind::InvalidField => {
                "Call the model_fields operation to inspect valid fields before retrying"
            }
            ErrorKind::InvalidMethod => {
                "Check the method name against the model's public methods and retry"
            }
            ErrorKind::AuthFailed => {
                "Check the configured username and password or API key; retrying will not help until they change"
            }
            ErrorKind::TransportError => {
                "The upstream server could not be reached; retry once connectivity is restored"
            }
            ErrorKind::UpstreamFault => {
                "The upstream server rejected the call; inspect the message, correct the request, and retry"
            }
            ErrorKind::Unknown => "Inspect the message and retry if the cause is transient",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// SERVICE ERROR STRUCT
// ============================================================================

/// Structured error for proxy operations.
///
/// Carries everything the caller needs to decide what to do next: the
/// category, a human-readable message, a remediation hint, and whether a
/// retry can succeed. Serializes as the `error` member of the response
/// envelope.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ServiceError {
    /// Category of the failure
    pub kind: ErrorKind,

    /// Human-readable description of what went wrong
    pub message: String,

    /// Suggested corrective action
    pub hint: String,

    /// Whether retrying (after correcting input, where applicable) can succeed
    pub retryable: bool,
}

impl ServiceError {
    /// Create an error with the kind's default hint and retryability.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            hint: kind.default_hint().to_string(),
            retryable: kind.retryable(),
        }
    }

    /// Replace the default hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = hint.into();
        self
    }

    // ========================================================================
    // Convenience constructors for common errors
    // ========================================================================

    /// Create an InvalidDomain error.
    pub fn invalid_domain(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidDomain, message)
    }

    /// Create an InvalidEntity error for an unknown model name.
    pub fn invalid_entity(model: &str) -> Self {
        Self::new(
            ErrorKind::InvalidEntity,
            format!("Model '{}' does not exist", model),
        )
    }

    /// Create an InvalidField error listing every unknown field at once.
    pub fn invalid_fields(model: &str, missing: &[String]) -> Self {
        Self::new(
            ErrorKind::InvalidField,
            format!(
                "Unknown field(s) on model '{}': {}",
                model,
                missing.join(", ")
            ),
        )
    }

    /// Create an InvalidMethod error.
    pub fn invalid_method(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidMethod, message)
    }

    /// Create an AuthFailed error (non-retryable).
    pub fn auth_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AuthFailed, message)
    }

    /// Create a TransportError.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransportError, message)
    }

    /// Create an UpstreamFault error.
    pub fn upstream_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UpstreamFault, message)
    }

    /// Create an Unknown error.
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias used throughout the proxy layers.
pub type ServiceResult<T> = Result<T, ServiceError>;

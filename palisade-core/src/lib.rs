//! PALISADE Core - Shared Types for the Proxy Layer
//!
//! This crate holds the pieces every other Palisade crate depends on:
//! the error model (`ServiceError` and its kinds), the environment-driven
//! configuration, the domain-filter types with their raw-input unions,
//! and the uniform response envelope returned by every public operation.
//!
//! Nothing in this crate performs I/O.

pub mod config;
pub mod domain;
pub mod envelope;
pub mod error;

pub use config::{CacheSettings, Config, ConfigError, UpstreamConfig};
pub use domain::{
    domain_to_value, normalize_domain, normalize_fields, DomainClause, RawDomain, RawFields,
};
pub use envelope::{CacheOutcome, Envelope, ResponseMeta};
pub use error::{ErrorKind, ServiceError, ServiceResult};

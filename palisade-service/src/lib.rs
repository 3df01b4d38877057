//! Palisade proxy service.
//!
//! The public surface of the proxy core: typed requests come in, every
//! input is validated against cached upstream metadata, cacheable reads
//! are answered from the fingerprint cache when possible, and every
//! outcome leaves as a uniform [`Envelope`] - success or failure, never a
//! panic or a raw error.
//!
//! The excluded tool-call front end binds these operations to its wire
//! protocol; nothing protocol-specific appears below this line.
//!
//! [`Envelope`]: palisade_core::Envelope

pub mod service;
pub mod types;
pub mod validator;

pub use service::ProxyService;
pub use types::{
    CreateRequest, DeleteRequest, ExecuteRequest, ListModelsRequest, ModelFieldsRequest,
    ModelInfoRequest, ReadRequest, RecordIds, RecordValues, SearchCountRequest, SearchReadRequest,
    SearchRequest, UpdateRequest,
};
pub use validator::{CacheStatus, RequestValidator};

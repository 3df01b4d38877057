//! Palisade upstream gateway.
//!
//! This crate owns everything that touches the wire: the [`Transport`]
//! trait seam, the production JSON-RPC implementation, the one-time
//! classification of transport failures into [`ServiceError`]s, and the
//! [`UpstreamGateway`] that layers cached authentication on top of raw
//! remote procedure calls.
//!
//! [`ServiceError`]: palisade_core::ServiceError

pub mod classify;
pub mod gateway;
pub mod jsonrpc;
pub mod transport;

pub use classify::{classify, classify_fault};
pub use gateway::UpstreamGateway;
pub use jsonrpc::JsonRpcTransport;
pub use transport::{RpcError, Transport};

//! steadyrun-gateway: Typed facade over the provider API
//!
//! Provides the `ServiceGateway` trait plus two implementations: an HTTP
//! gateway speaking the provider's JSON RPC protocol, and an in-memory
//! provider simulation used in tests.

pub mod error;
pub mod http;
pub mod memory;
pub mod pagination;
pub mod request;
pub mod traits;
pub mod wire;

pub use error::GatewayError;
pub use http::HttpGateway;
pub use memory::{GatewayCall, MemoryGateway, Operation, Step};
pub use pagination::{Page, drain};
pub use request::{CreateServiceRequest, ServiceUpdate};
pub use traits::ServiceGateway;

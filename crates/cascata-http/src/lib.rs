//! Cascata HTTP - outstanding-request registry
//!
//! This crate tracks HTTP exchanges that have been received but not yet
//! answered, so that the component receiving a request and the component
//! producing its response can be different. It provides:
//! - `HttpContextMap`: bounded concurrent registry of pending exchanges
//! - a background sweeper answering expired exchanges with
//!   "service unavailable"

pub mod context_map;
pub mod model;

// Re-export commonly used types
pub use context_map::HttpContextMap;
pub use model::{
    ContextMapConfig, ContextMapError, HttpRequestInfo, ResponseDirective, ResponseHandle,
    DEFAULT_MAX_OUTSTANDING_REQUESTS, DEFAULT_REQUEST_EXPIRATION,
};

//! Cascata API - endpoint descriptors and registries
//!
//! This crate provides:
//! - `ApiInfo`, the descriptor of one HTTP API endpoint exposed by a flow
//! - `ApiRegistry`, the process-wide registry of those descriptors
//! - `KeyValueLookup`, a concurrent name/value registry

pub mod lookup;
pub mod model;
pub mod registry;

// Re-export commonly used types
pub use lookup::KeyValueLookup;
pub use model::{ApiInfo, ApiState, DEFAULT_REQUEST_TIMEOUT_MS};
pub use registry::{ApiChangeListener, ApiRegistry};

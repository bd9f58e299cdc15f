//! Cascata Common - Shared types and utilities
//!
//! This crate provides the foundational pieces used across all Cascata
//! components:
//! - Error types
//! - The platform duration grammar ("1 min", "12 hours", ...)
//! - Digest helpers

pub mod error;
pub mod utils;

// Re-exports for convenience
pub use error::CascataError;
pub use utils::{md5_bytes, md5_hex, parse_time_period};

/// Field carrying the snapshot creation time in collected usage data
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Separator between entries of comma-separated list properties
pub const LIST_SEPARATOR: char = ',';

/// Separator between the name and password of a configured user entry
pub const ITEM_SEPARATOR: char = ':';

//! Concurrent key/value registry
//!
//! A lookup service keyed by a single `"key"` coordinate, used to share small
//! values between components of a running flow.

use std::collections::HashMap;

use dashmap::DashMap;
use serde_json::Value;

/// Coordinate name required by [`KeyValueLookup::lookup`]
pub const COORDINATE_KEY: &str = "key";

/// Concurrent name/value registry
#[derive(Default)]
pub struct KeyValueLookup {
    values: DashMap<String, Value>,
}

impl KeyValueLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value under a name; an empty name is rejected
    pub fn register(&self, name: &str, value: Value) -> bool {
        if name.is_empty() {
            return false;
        }
        self.values.insert(name.to_string(), value);
        true
    }

    /// Value stored under the given name, if any
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).map(|entry| entry.value().clone())
    }

    /// Coordinate-map lookup; requires the `"key"` coordinate
    pub fn lookup(&self, coordinates: &HashMap<String, Value>) -> Option<Value> {
        let key = coordinates.get(COORDINATE_KEY)?;
        let key = key.as_str()?;
        self.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

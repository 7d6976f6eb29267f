use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Immutable key/value snapshot of one namespace.
///
/// A snapshot is replaced wholesale on every successful fetch and never
/// mutated in place, so readers holding an `Arc` to it observe a consistent
/// release.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    /// Flattened key/value pairs as served by the remote service
    pub configurations: HashMap<String, String>,

    /// Opaque version marker returned with an authoritative fetch.
    /// Diagnostics only; never used for conflict resolution.
    pub release_key: String,
}

impl ConfigSnapshot {
    pub fn new(configurations: HashMap<String, String>, release_key: impl Into<String>) -> Self {
        Self {
            configurations,
            release_key: release_key.into(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.configurations.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.configurations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configurations.is_empty()
    }
}

//! Registry of storage keys written by this engine.
//!
//! Reference strings are plain text, so anything can look like one. A key is
//! trusted as "already persisted" only when it was registered here after a
//! confirmed write. Entries are scoped by storage identity and are never
//! evicted.

use dashmap::DashSet;
use std::sync::Arc;

/// Concurrent set of `(storage identity, key)` pairs.
///
/// Cloning is cheap and shares the underlying set, so the compactor and the
/// reader tools can observe the same registrations.
#[derive(Debug, Clone, Default)]
pub struct KnownKeys {
    inner: Arc<DashSet<(String, String)>>,
}

impl KnownKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `key` as written by this engine to `storage`.
    pub fn register(&self, storage: &str, key: &str) {
        self.inner.insert((storage.to_string(), key.to_string()));
    }

    /// Whether `key` was registered for `storage`.
    pub fn is_known(&self, storage: &str, key: &str) -> bool {
        self.inner.contains(&(storage.to_string(), key.to_string()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }
}

//! Compaction options.

use super::boundary::Boundary;
use crate::errors::{BoxError, ConfigError};
use crate::storage::StorageSpec;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Tool names whose results are reads of already-stored content.
pub const DEFAULT_READER_TOOL_NAMES: [&str; 2] = ["readFile", "grepAndSearchFile"];

/// Compaction strategy. Only one is supported today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    #[default]
    WriteToolResultsToStorage,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::WriteToolResultsToStorage => write!(f, "write-tool-results-to-storage"),
        }
    }
}

impl std::str::FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "write-tool-results-to-storage" => Ok(Strategy::WriteToolResultsToStorage),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }
}

/// How storage keys are derived for persisted results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStrategy {
    /// SHA-256 of the persisted body. Identical payloads share a key.
    #[default]
    ContentHash,
    /// A fresh UUIDv4 per write.
    Random,
}

impl std::fmt::Display for KeyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyStrategy::ContentHash => write!(f, "content-hash"),
            KeyStrategy::Random => write!(f, "random"),
        }
    }
}

impl std::str::FromStr for KeyStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "content-hash" => Ok(KeyStrategy::ContentHash),
            "random" => Ok(KeyStrategy::Random),
            other => Err(ConfigError::UnknownKeyStrategy(other.to_string())),
        }
    }
}

/// What to do when persisting one block fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Abort at the first failure and return the error.
    #[default]
    FailFast,
    /// Leave the failing block untouched, log it, and keep going.
    BestEffort,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::FailFast => write!(f, "fail-fast"),
            FailurePolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fail-fast" => Ok(FailurePolicy::FailFast),
            "best-effort" => Ok(FailurePolicy::BestEffort),
            other => Err(ConfigError::UnknownFailurePolicy(other.to_string())),
        }
    }
}

type SerializeFn = dyn Fn(&Value) -> Result<String, BoxError> + Send + Sync;

/// Turns a JSON tool output into the text that gets persisted.
#[derive(Clone)]
pub struct Serializer(Arc<SerializeFn>);

impl Serializer {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Value) -> Result<String, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn serialize(&self, value: &Value) -> Result<String, BoxError> {
        (self.0)(value)
    }
}

impl Default for Serializer {
    /// Two-space indented JSON. Object keys come out sorted, so the output is
    /// stable for content-hash keys.
    fn default() -> Self {
        Self::new(|value| serde_json::to_string_pretty(value).map_err(BoxError::from))
    }
}

impl std::fmt::Debug for Serializer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Serializer(..)")
    }
}

/// Options for a compaction run.
#[derive(Debug, Clone)]
pub struct CompactOptions {
    pub strategy: Strategy,
    pub storage: StorageSpec,
    pub boundary: Boundary,
    pub serialize_result: Serializer,
    /// Tools whose own results are never compacted.
    pub storage_reader_tool_names: BTreeSet<String>,
    pub key_strategy: KeyStrategy,
    pub failure_policy: FailurePolicy,
}

impl Default for CompactOptions {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            storage: StorageSpec::Default,
            boundary: Boundary::default(),
            serialize_result: Serializer::default(),
            storage_reader_tool_names: DEFAULT_READER_TOOL_NAMES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            key_strategy: KeyStrategy::default(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl CompactOptions {
    pub fn with_storage(mut self, storage: impl Into<StorageSpec>) -> Self {
        self.storage = storage.into();
        self
    }

    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = boundary;
        self
    }

    pub fn with_serializer(mut self, serializer: Serializer) -> Self {
        self.serialize_result = serializer;
        self
    }

    /// Replace the reader tool names. An empty list keeps the defaults.
    pub fn with_reader_tool_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: BTreeSet<String> = names.into_iter().map(Into::into).collect();
        if !names.is_empty() {
            self.storage_reader_tool_names = names;
        }
        self
    }

    pub fn with_key_strategy(mut self, key_strategy: KeyStrategy) -> Self {
        self.key_strategy = key_strategy;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    pub fn is_reader_tool(&self, tool_name: &str) -> bool {
        self.storage_reader_tool_names.contains(tool_name)
    }
}

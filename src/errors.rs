//! Typed error hierarchy for ctxzip.
//!
//! Four top-level enums cover the subsystems:
//! - `ConfigError`: unresolvable storage URIs, invalid boundaries, bad config files
//! - `StorageError`: failures reported by a storage adapter
//! - `CompactError`: compaction engine failures, with message/tool context
//! - `ToolError`: read and grep tool failures

use thiserror::Error;

/// Boxed error returned by custom result serializers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Configuration errors, raised before any message is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unsupported storage URI scheme: {scheme}")]
    UnsupportedScheme { scheme: String },

    #[error(
        "Storage adapter for '{scheme}' not yet implemented. Currently 'file://' and 'memory://' URIs are supported."
    )]
    BackendNotImplemented { scheme: String },

    #[error("Invalid storage URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Invalid boundary: {0}")]
    InvalidBoundary(String),

    #[error("Unknown compaction strategy: {0}")]
    UnknownStrategy(String),

    #[error("Unknown key strategy '{0}'. Valid values: content-hash, random")]
    UnknownKeyStrategy(String),

    #[error("Unknown failure policy '{0}'. Valid values: fail-fast, best-effort")]
    UnknownFailurePolicy(String),

    #[error("Failed to read config file at {path}: {source}")]
    ReadFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    ParseFailed {
        path: std::path::PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to initialize storage: {0}")]
    Storage(#[from] StorageError),
}

/// Errors raised by storage adapters.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("I/O error for key '{key}': {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StorageError {
    /// Map an I/O error for `key`, turning `NotFound` into [`StorageError::NotFound`].
    pub fn from_io(key: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StorageError::NotFound {
                key: key.to_string(),
            }
        } else {
            StorageError::Io {
                key: key.to_string(),
                source,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Errors from the compaction engine.
#[derive(Debug, Error)]
pub enum CompactError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    #[error("Failed to write tool result '{tool_name}' (message {message_index}) to key {key}: {source}")]
    StorageWrite {
        message_index: usize,
        tool_name: String,
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to serialize tool result '{tool_name}' (message {message_index}): {source}")]
    Serialization {
        message_index: usize,
        tool_name: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to start blocking runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Errors from the reader tools.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Invalid regex '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown key '{key}': it was not written during this conversation")]
    UnknownKey { key: String },

    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Storage error for key '{key}': {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl ToolError {
    /// Wrap a storage error for `key`, surfacing `NotFound` directly.
    pub fn from_storage(key: &str, source: StorageError) -> Self {
        match source {
            StorageError::NotFound { .. } => ToolError::NotFound {
                key: key.to_string(),
            },
            other => ToolError::Storage {
                key: key.to_string(),
                source: other,
            },
        }
    }
}

//! Storage adapters for persisted tool results.
//!
//! The compaction engine and the reader tools depend only on the
//! [`StorageAdapter`] trait. Two adapters ship with the crate:
//!
//! - [`FileStorageAdapter`]: files under a base directory (`file://` URIs)
//! - [`MemoryStorageAdapter`]: process-local map (`memory://` URIs)
//!
//! Adapters are usually obtained through [`create_storage_adapter`], which
//! accepts a URI, an existing adapter, or nothing (fresh temp directory).

mod filesystem;
mod known_keys;
mod memory;
mod resolver;

pub use filesystem::{DEFAULT_CHUNK_SIZE, FileStorageAdapter};
pub use known_keys::KnownKeys;
pub use memory::MemoryStorageAdapter;
pub use resolver::{StorageSpec, create_storage_adapter, file_uri_from_dir};

use crate::errors::StorageError;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};

/// A finite stream of raw content chunks.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, StorageError>>;

/// Parameters for a storage write.
#[derive(Debug, Clone)]
pub struct StorageWriteParams {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

impl StorageWriteParams {
    pub fn text(key: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            body: body.into().into_bytes(),
            content_type: Some("text/plain".to_string()),
        }
    }
}

/// Result of a storage write. `url` is adapter-defined and opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageWriteResult {
    pub key: String,
    pub url: Option<String>,
}

/// Half-open byte range `[start, end)`; `end = None` reads to the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: Option<u64>,
}

impl ByteRange {
    pub fn new(start: u64, end: Option<u64>) -> Self {
        Self { start, end }
    }

    /// Clamp the range to a buffer of `len` bytes.
    pub fn slice<'a>(&self, bytes: &'a [u8]) -> &'a [u8] {
        let len = bytes.len() as u64;
        let start = self.start.min(len);
        let end = self.end.unwrap_or(len).clamp(start, len);
        &bytes[start as usize..end as usize]
    }
}

/// Parameters for a storage read.
#[derive(Debug, Clone)]
pub struct StorageReadParams {
    pub key: String,
    pub range: Option<ByteRange>,
}

impl StorageReadParams {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            range: None,
        }
    }

    pub fn with_range(mut self, range: ByteRange) -> Self {
        self.range = Some(range);
        self
    }
}

/// Capability contract for a storage backend.
///
/// Every method that touches the backend is async; these are the only
/// suspension points of a compaction or search.
#[async_trait]
pub trait StorageAdapter: Send + Sync + std::fmt::Debug {
    /// Persist `params.body` under `params.key`.
    async fn write(&self, params: StorageWriteParams) -> Result<StorageWriteResult, StorageError>;

    /// Read the content stored under `params.key` as text.
    ///
    /// Fails with [`StorageError::NotFound`] if the key is absent.
    async fn read_text(&self, params: StorageReadParams) -> Result<String, StorageError>;

    /// Open a chunked stream over the stored content.
    ///
    /// The default reads the whole text and yields it as a single chunk.
    async fn open_read_stream(
        &self,
        params: StorageReadParams,
    ) -> Result<ChunkStream, StorageError> {
        let text = self.read_text(params).await?;
        Ok(Box::pin(stream::iter(vec![Ok(text.into_bytes())])))
    }

    /// Apply adapter-specific namespacing to a logical name.
    ///
    /// Must be idempotent: resolving an already-resolved key returns it unchanged.
    fn resolve_key(&self, name: &str) -> String;

    /// Human-readable identity used in reference strings, e.g. `file:///tmp/ctx`.
    fn identify(&self) -> String;
}

/// Normalize a key into `/`-separated segments, dropping empty, `.` and `..`
/// segments so that no key can walk out of its namespace.
pub(crate) fn sanitize_key(name: &str) -> String {
    name.replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect::<Vec<_>>()
        .join("/")
}

/// Prefix `key` with `prefix/` unless it already carries it.
pub(crate) fn apply_prefix(prefix: Option<&str>, key: String) -> String {
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) if key == prefix || key.starts_with(&format!("{}/", prefix)) => key,
        Some(prefix) => format!("{}/{}", prefix, key),
        None => key,
    }
}

//! In-memory storage adapter.
//!
//! Useful for tests and for hosts that only need stored results for the
//! lifetime of the process.

use super::{
    ChunkStream, StorageAdapter, StorageReadParams, StorageWriteParams, StorageWriteResult,
    apply_prefix, sanitize_key,
};
use crate::errors::StorageError;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream;
use std::sync::Arc;

/// Stores content in a concurrent map keyed by storage key.
#[derive(Debug, Clone)]
pub struct MemoryStorageAdapter {
    name: String,
    prefix: Option<String>,
    chunk_size: usize,
    entries: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryStorageAdapter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prefix: None,
            chunk_size: super::DEFAULT_CHUNK_SIZE,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = sanitize_key(&prefix.into());
        self.prefix = (!prefix.is_empty()).then_some(prefix);
        self
    }

    /// Chunk size used by [`StorageAdapter::open_read_stream`].
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StorageError::NotFound {
                key: key.to_string(),
            })
    }
}

impl Default for MemoryStorageAdapter {
    fn default() -> Self {
        Self::new("default")
    }
}

#[async_trait]
impl StorageAdapter for MemoryStorageAdapter {
    async fn write(&self, params: StorageWriteParams) -> Result<StorageWriteResult, StorageError> {
        if params.key.is_empty() {
            return Err(StorageError::InvalidKey {
                key: params.key,
                reason: "key must not be empty".to_string(),
            });
        }
        let url = format!("{}/{}", self.identify(), params.key);
        self.entries.insert(params.key.clone(), params.body);
        Ok(StorageWriteResult {
            key: params.key,
            url: Some(url),
        })
    }

    async fn read_text(&self, params: StorageReadParams) -> Result<String, StorageError> {
        let bytes = self.get(&params.key)?;
        let bytes = match params.range {
            Some(range) => range.slice(&bytes),
            None => &bytes[..],
        };
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    async fn open_read_stream(
        &self,
        params: StorageReadParams,
    ) -> Result<ChunkStream, StorageError> {
        let bytes = self.get(&params.key)?;
        let bytes = match params.range {
            Some(range) => range.slice(&bytes).to_vec(),
            None => bytes,
        };
        let chunks: Vec<Result<Vec<u8>, StorageError>> = bytes
            .chunks(self.chunk_size)
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }

    fn resolve_key(&self, name: &str) -> String {
        apply_prefix(self.prefix.as_deref(), sanitize_key(name))
    }

    fn identify(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("memory://{}/{}", self.name, prefix),
            None => format!("memory://{}", self.name),
        }
    }
}

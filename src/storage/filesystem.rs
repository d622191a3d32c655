//! Filesystem storage adapter.

use super::{
    ChunkStream, StorageAdapter, StorageReadParams, StorageWriteParams, StorageWriteResult,
    apply_prefix, file_uri_from_dir, sanitize_key,
};
use crate::errors::StorageError;
use async_trait::async_trait;
use futures::stream;
use std::path::{Component, Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Default chunk size for streaming reads (64 KiB).
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Persists content as files under a base directory.
#[derive(Debug, Clone)]
pub struct FileStorageAdapter {
    base_dir: PathBuf,
    prefix: Option<String>,
    chunk_size: usize,
}

impl FileStorageAdapter {
    /// Create an adapter rooted at `base_dir`, creating the directory if needed.
    ///
    /// Directory creation and path canonicalization happen here, once, on the
    /// calling thread. Every read and write after that goes through `tokio::fs`.
    pub fn new(base_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_dir = base_dir.as_ref();
        std::fs::create_dir_all(base_dir)
            .map_err(|e| StorageError::from_io(&base_dir.display().to_string(), e))?;
        let base_dir = base_dir
            .canonicalize()
            .map_err(|e| StorageError::from_io(&base_dir.display().to_string(), e))?;

        Ok(Self {
            base_dir,
            prefix: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    /// Namespace every key under `prefix` (e.g. a session id).
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

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Map a key to a path inside the base directory, rejecting anything that
    /// could escape it.
    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let escapes = key.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(StorageError::InvalidKey {
                key: key.to_string(),
                reason: "keys must be relative paths without '.' or '..' segments".to_string(),
            });
        }
        Ok(self.base_dir.join(relative))
    }
}

#[async_trait]
impl StorageAdapter for FileStorageAdapter {
    async fn write(&self, params: StorageWriteParams) -> Result<StorageWriteResult, StorageError> {
        let path = self.path_for(&params.key)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::from_io(&params.key, e))?;
        }
        tokio::fs::write(&path, &params.body)
            .await
            .map_err(|e| StorageError::from_io(&params.key, e))?;

        tracing::debug!(key = %params.key, bytes = params.body.len(), path = %path.display(), "wrote stored content");

        let url = url::Url::from_file_path(&path).ok().map(String::from);
        Ok(StorageWriteResult {
            key: params.key,
            url,
        })
    }

    async fn read_text(&self, params: StorageReadParams) -> Result<String, StorageError> {
        let path = self.path_for(&params.key)?;

        let bytes = match params.range {
            None => tokio::fs::read(&path)
                .await
                .map_err(|e| StorageError::from_io(&params.key, e))?,
            Some(range) => {
                let mut file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|e| StorageError::from_io(&params.key, e))?;
                file.seek(std::io::SeekFrom::Start(range.start))
                    .await
                    .map_err(|e| StorageError::from_io(&params.key, e))?;
                let mut buf = Vec::new();
                let read = match range.end {
                    Some(end) => {
                        file.take(end.saturating_sub(range.start))
                            .read_to_end(&mut buf)
                            .await
                    }
                    None => file.read_to_end(&mut buf).await,
                };
                read.map_err(|e| StorageError::from_io(&params.key, e))?;
                buf
            }
        };

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn open_read_stream(
        &self,
        params: StorageReadParams,
    ) -> Result<ChunkStream, StorageError> {
        let path = self.path_for(&params.key)?;
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| StorageError::from_io(&params.key, e))?;
        if let Some(range) = params.range {
            file.seek(std::io::SeekFrom::Start(range.start))
                .await
                .map_err(|e| StorageError::from_io(&params.key, e))?;
        }

        let remaining = params
            .range
            .and_then(|r| r.end.map(|end| end.saturating_sub(r.start)));
        let chunk_size = self.chunk_size;
        let key = params.key;

        let chunks = stream::try_unfold(
            (file, remaining, key),
            move |(mut file, remaining, key)| async move {
                let want = match remaining {
                    Some(0) => return Ok::<_, StorageError>(None),
                    Some(left) => chunk_size.min(left as usize),
                    None => chunk_size,
                };
                let mut buf = vec![0u8; want];
                let read = file
                    .read(&mut buf)
                    .await
                    .map_err(|e| StorageError::from_io(&key, e))?;
                if read == 0 {
                    return Ok::<_, StorageError>(None);
                }
                buf.truncate(read);
                let remaining = remaining.map(|left| left - read as u64);
                Ok(Some((buf, (file, remaining, key))))
            },
        );

        Ok(Box::pin(chunks))
    }

    fn resolve_key(&self, name: &str) -> String {
        apply_prefix(self.prefix.as_deref(), sanitize_key(name))
    }

    fn identify(&self) -> String {
        let base = file_uri_from_dir(&self.base_dir);
        match &self.prefix {
            Some(prefix) => format!("{}/{}", base.trim_end_matches('/'), prefix),
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::ByteRange;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    fn adapter(dir: &TempDir) -> FileStorageAdapter {
        FileStorageAdapter::new(dir.path()).unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let storage = adapter(&dir);

        let result = storage
            .write(StorageWriteParams::text("data.json", r#"{"a": 1}"#))
            .await
            .unwrap();
        assert_eq!(result.key, "data.json");
        assert!(result.url.unwrap().starts_with("file://"));

        let text = storage
            .read_text(StorageReadParams::new("data.json"))
            .await
            .unwrap();
        assert_eq!(text, r#"{"a": 1}"#);
        assert!(dir.path().join("data.json").exists());
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let storage = adapter(&dir);

        let err = storage
            .read_text(StorageReadParams::new("missing.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());

        let err = storage
            .open_read_stream(StorageReadParams::new("missing.txt"))
            .await
            .err()
            .expect("expected NotFound error");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_prefix_creates_subdirectory() {
        let dir = TempDir::new().unwrap();
        let storage = adapter(&dir).with_prefix("session-1");

        let key = storage.resolve_key("x.txt");
        assert_eq!(key, "session-1/x.txt");
        assert_eq!(storage.resolve_key(&key), key);

        storage
            .write(StorageWriteParams::text(key.clone(), "hello"))
            .await
            .unwrap();
        assert!(dir.path().join("session-1").join("x.txt").exists());
        assert!(storage.identify().ends_with("/session-1"));
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let storage = adapter(&dir);

        assert_eq!(storage.resolve_key("../../etc/passwd"), "etc/passwd");

        let err = storage
            .write(StorageWriteParams::text("../escape.txt", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));

        let err = storage
            .read_text(StorageReadParams::new("/etc/passwd"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidKey { .. }));
    }

    #[tokio::test]
    async fn test_stream_chunks_cover_content() {
        let dir = TempDir::new().unwrap();
        let storage = adapter(&dir).with_chunk_size(3);
        storage
            .write(StorageWriteParams::text("k.txt", "line one\nline two\n"))
            .await
            .unwrap();

        let chunks: Vec<Vec<u8>> = storage
            .open_read_stream(StorageReadParams::new("k.txt"))
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert!(chunks.iter().all(|c| c.len() <= 3));
        assert_eq!(chunks.concat(), b"line one\nline two\n".to_vec());
    }

    #[tokio::test]
    async fn test_byte_range_reads() {
        let dir = TempDir::new().unwrap();
        let storage = adapter(&dir).with_chunk_size(2);
        storage
            .write(StorageWriteParams::text("k.txt", "0123456789"))
            .await
            .unwrap();

        let text = storage
            .read_text(StorageReadParams::new("k.txt").with_range(ByteRange::new(2, Some(6))))
            .await
            .unwrap();
        assert_eq!(text, "2345");

        let chunks: Vec<Vec<u8>> = storage
            .open_read_stream(
                StorageReadParams::new("k.txt").with_range(ByteRange::new(5, Some(8))),
            )
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.concat(), b"567".to_vec());
    }

    #[test]
    fn test_identify_is_file_uri() {
        let dir = TempDir::new().unwrap();
        let storage = adapter(&dir);
        let identity = storage.identify();
        assert!(identity.starts_with("file://"));
        assert!(!identity.ends_with('/'));
    }
}

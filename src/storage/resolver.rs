//! Storage adapter resolution from URIs.

use super::{FileStorageAdapter, MemoryStorageAdapter, StorageAdapter};
use crate::errors::ConfigError;
use dashmap::DashMap;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use url::Url;

/// Named in-memory stores, so that `memory://name` resolves to the same
/// adapter everywhere in the process.
static MEMORY_STORES: LazyLock<DashMap<String, MemoryStorageAdapter>> =
    LazyLock::new(DashMap::new);

/// Where compacted tool results should be stored.
#[derive(Debug, Clone, Default)]
pub enum StorageSpec {
    /// A fresh `ctxzip_<uuid>` directory under the system temp dir.
    #[default]
    Default,
    /// A storage URI such as `file:///var/tmp/ctx` or `memory://session`.
    Uri(String),
    /// An existing adapter.
    Adapter(Arc<dyn StorageAdapter>),
}

impl From<&str> for StorageSpec {
    fn from(uri: &str) -> Self {
        StorageSpec::Uri(uri.to_string())
    }
}

impl From<String> for StorageSpec {
    fn from(uri: String) -> Self {
        StorageSpec::Uri(uri)
    }
}

impl From<Arc<dyn StorageAdapter>> for StorageSpec {
    fn from(adapter: Arc<dyn StorageAdapter>) -> Self {
        StorageSpec::Adapter(adapter)
    }
}

impl From<Option<String>> for StorageSpec {
    fn from(uri: Option<String>) -> Self {
        uri.map(StorageSpec::Uri).unwrap_or_default()
    }
}

/// Create or return a storage adapter for `spec`.
///
/// Supported URI schemes:
/// - `file:///abs/path`: [`FileStorageAdapter`] rooted at the path
/// - `memory://name[/prefix]`: process-wide [`MemoryStorageAdapter`] named `name`
///
/// `s3://` and `blob://` are recognized but not implemented.
///
/// Resolving a `file://` URI (or the default) creates the directory
/// synchronously; callers resolve once per compactor, not per write.
pub fn create_storage_adapter(spec: &StorageSpec) -> Result<Arc<dyn StorageAdapter>, ConfigError> {
    match spec {
        StorageSpec::Adapter(adapter) => Ok(Arc::clone(adapter)),
        StorageSpec::Default => {
            let dir = std::env::temp_dir().join(format!("ctxzip_{}", uuid::Uuid::new_v4().simple()));
            tracing::debug!(dir = %dir.display(), "using temporary storage directory");
            Ok(Arc::new(FileStorageAdapter::new(&dir)?))
        }
        StorageSpec::Uri(uri) => from_uri(uri),
    }
}

fn from_uri(uri: &str) -> Result<Arc<dyn StorageAdapter>, ConfigError> {
    let parsed = Url::parse(uri).map_err(|e| ConfigError::InvalidUri {
        uri: uri.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "file" => {
            let path = parsed
                .to_file_path()
                .map_err(|_| ConfigError::InvalidUri {
                    uri: uri.to_string(),
                    reason: "file URIs must be absolute local paths".to_string(),
                })?;
            Ok(Arc::new(FileStorageAdapter::new(path)?))
        }
        "memory" => {
            let name = parsed.host_str().unwrap_or("default").to_string();
            let prefix = parsed.path().trim_matches('/').to_string();
            let store = MEMORY_STORES
                .entry(name.clone())
                .or_insert_with(|| MemoryStorageAdapter::new(name))
                .clone();
            if prefix.is_empty() {
                Ok(Arc::new(store))
            } else {
                Ok(Arc::new(store.with_prefix(prefix)))
            }
        }
        "s3" | "blob" => Err(ConfigError::BackendNotImplemented {
            scheme: parsed.scheme().to_string(),
        }),
        other => Err(ConfigError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

/// `file://` URI for a directory, without a trailing slash.
pub fn file_uri_from_dir(dir: &Path) -> String {
    Url::from_file_path(dir)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| format!("file://{}", dir.display()))
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageReadParams, StorageWriteParams};
    use tempfile::TempDir;

    #[test]
    fn test_file_uri_resolves_to_filesystem_adapter() {
        let dir = TempDir::new().unwrap();
        let uri = file_uri_from_dir(dir.path());
        let adapter = create_storage_adapter(&StorageSpec::from(uri.as_str())).unwrap();
        assert!(adapter.identify().starts_with("file://"));
        assert!(dir.path().exists());
    }

    #[tokio::test]
    async fn test_file_uri_resolved_inside_runtime() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("nested").join("store");
        let uri = file_uri_from_dir(&root);

        let adapter = create_storage_adapter(&StorageSpec::from(uri.as_str())).unwrap();
        assert!(root.is_dir());

        adapter.write(StorageWriteParams::text("k.txt", "v")).await.unwrap();
        let text = adapter.read_text(StorageReadParams::new("k.txt")).await.unwrap();
        assert_eq!(text, "v");
    }

    #[test]
    fn test_default_creates_temp_dir() {
        let adapter = create_storage_adapter(&StorageSpec::Default).unwrap();
        assert!(adapter.identify().contains("ctxzip_"));
    }

    #[test]
    fn test_adapter_passthrough() {
        let memory: Arc<dyn StorageAdapter> = Arc::new(MemoryStorageAdapter::new("passthrough"));
        let resolved = create_storage_adapter(&StorageSpec::Adapter(Arc::clone(&memory))).unwrap();
        assert!(Arc::ptr_eq(&memory, &resolved));
    }

    #[tokio::test]
    async fn test_memory_uri_is_shared_by_name() {
        let a = create_storage_adapter(&"memory://resolver-shared".into()).unwrap();
        let b = create_storage_adapter(&"memory://resolver-shared".into()).unwrap();

        a.write(StorageWriteParams::text("k.txt", "v")).await.unwrap();
        let text = b.read_text(StorageReadParams::new("k.txt")).await.unwrap();
        assert_eq!(text, "v");
    }

    #[test]
    fn test_memory_uri_with_prefix() {
        let adapter = create_storage_adapter(&"memory://resolver-prefixed/conv-1".into()).unwrap();
        assert_eq!(adapter.identify(), "memory://resolver-prefixed/conv-1");
        assert_eq!(adapter.resolve_key("a.txt"), "conv-1/a.txt");
    }

    #[test]
    fn test_unimplemented_and_unsupported_schemes() {
        let err = create_storage_adapter(&"s3://bucket/prefix".into()).unwrap_err();
        assert!(matches!(err, ConfigError::BackendNotImplemented { ref scheme } if scheme == "s3"));

        let err = create_storage_adapter(&"ftp://host/dir".into()).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedScheme { ref scheme } if scheme == "ftp"));

        let err = create_storage_adapter(&"not a uri".into()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUri { .. }));
    }
}

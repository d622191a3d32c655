//! Configuration for ctxzip.
//!
//! Settings come from `ctxzip.toml` and are layered file → environment → CLI.
//!
//! # Configuration File Format
//!
//! ```toml
//! [compaction]
//! strategy = "write-tool-results-to-storage"
//! storage = "file:///var/tmp/ctxzip"
//! boundary = "since-last-assistant-or-user-text"
//! # boundary = { type = "first-n-messages", count = 2 }
//! key_strategy = "content-hash"
//! failure_policy = "fail-fast"
//! storage_reader_tool_names = ["readFile", "grepAndSearchFile"]
//!
//! [search]
//! max_results = 100
//! context_lines = 0
//! ```
//!
//! `CTXZIP_STORAGE` overrides `compaction.storage`.

use crate::compaction::{
    Boundary, BoundarySpec, CompactOptions, DEFAULT_READER_TOOL_NAMES, FailurePolicy, KeyStrategy,
    Strategy,
};
use crate::errors::ConfigError;
use crate::search::{DEFAULT_MAX_RESULTS, GrepOptions};
use crate::storage::StorageSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "ctxzip.toml";

/// Environment variable overriding the storage URI.
pub const STORAGE_ENV: &str = "CTXZIP_STORAGE";

/// `[compaction]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionSection {
    /// Compaction strategy (only "write-tool-results-to-storage")
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Storage URI. Unset means a fresh temp directory per run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    /// Where the compaction window starts
    #[serde(default = "default_boundary")]
    pub boundary: BoundarySpec,
    /// "content-hash" or "random"
    #[serde(default = "default_key_strategy")]
    pub key_strategy: String,
    /// "fail-fast" or "best-effort"
    #[serde(default = "default_failure_policy")]
    pub failure_policy: String,
    /// Tools whose results are never compacted
    #[serde(default = "default_reader_tool_names")]
    pub storage_reader_tool_names: Vec<String>,
}

fn default_strategy() -> String {
    Strategy::default().to_string()
}

fn default_boundary() -> BoundarySpec {
    BoundarySpec::from(Boundary::default())
}

fn default_key_strategy() -> String {
    KeyStrategy::default().to_string()
}

fn default_failure_policy() -> String {
    FailurePolicy::default().to_string()
}

fn default_reader_tool_names() -> Vec<String> {
    DEFAULT_READER_TOOL_NAMES
        .iter()
        .map(|name| name.to_string())
        .collect()
}

impl Default for CompactionSection {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            storage: None,
            boundary: default_boundary(),
            key_strategy: default_key_strategy(),
            failure_policy: default_failure_policy(),
            storage_reader_tool_names: default_reader_tool_names(),
        }
    }
}

/// `[search]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub context_lines: usize,
}

fn default_max_results() -> usize {
    DEFAULT_MAX_RESULTS
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            max_results: default_max_results(),
            context_lines: 0,
        }
    }
}

/// The complete ctxzip.toml structure.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CtxZipToml {
    #[serde(default)]
    pub compaction: CompactionSection,
    #[serde(default)]
    pub search: SearchSection,
}

impl CtxZipToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::ParseFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `path`, or the defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize ctxzip.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Storage URI, with `CTXZIP_STORAGE` taking precedence over the file.
    pub fn storage(&self) -> Option<String> {
        std::env::var(STORAGE_ENV)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .or_else(|| self.compaction.storage.clone())
    }

    pub fn boundary(&self) -> Result<Boundary, ConfigError> {
        Boundary::try_from(self.compaction.boundary.clone())
    }

    /// Build compaction options. Fails on the first invalid value.
    pub fn to_compact_options(&self) -> Result<CompactOptions, ConfigError> {
        let options = CompactOptions {
            strategy: self.compaction.strategy.parse()?,
            storage: StorageSpec::from(self.storage()),
            boundary: self.boundary()?,
            key_strategy: self.compaction.key_strategy.parse()?,
            failure_policy: self.compaction.failure_policy.parse()?,
            ..CompactOptions::default()
        };
        Ok(options.with_reader_tool_names(self.compaction.storage_reader_tool_names.clone()))
    }

    pub fn grep_options(&self) -> GrepOptions {
        GrepOptions {
            max_results: self.search.max_results,
            context_lines: self.search.context_lines,
        }
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Err(e) = self.compaction.strategy.parse::<Strategy>() {
            warnings.push(e.to_string());
        }
        if let Err(e) = self.boundary() {
            warnings.push(e.to_string());
        }
        if let Err(e) = self.compaction.key_strategy.parse::<KeyStrategy>() {
            warnings.push(e.to_string());
        }
        if let Err(e) = self.compaction.failure_policy.parse::<FailurePolicy>() {
            warnings.push(e.to_string());
        }

        if let Some(ref storage) = self.compaction.storage {
            match url::Url::parse(storage) {
                Ok(url) if !matches!(url.scheme(), "file" | "memory") => warnings.push(format!(
                    "Storage '{}' uses the '{}' scheme, which is not supported; use file:// or memory://",
                    storage,
                    url.scheme()
                )),
                Ok(_) => {}
                Err(e) => warnings.push(format!("Invalid storage URI '{}': {}", storage, e)),
            }
        }

        if self.compaction.storage_reader_tool_names.is_empty() {
            warnings.push(
                "storage_reader_tool_names is empty; the defaults (readFile, grepAndSearchFile) will be used"
                    .to_string(),
            );
        }
        if self.search.max_results == 0 {
            warnings.push("search.max_results is 0; every search will return no matches".to_string());
        }

        warnings
    }
}

/// Runtime configuration: the config file merged with environment and CLI
/// overrides.
#[derive(Debug, Clone)]
pub struct CtxZipConfig {
    /// Path the file configuration was loaded from (it may not exist).
    pub path: PathBuf,
    pub toml: CtxZipToml,
    /// CLI override for the storage URI
    pub cli_storage: Option<String>,
}

impl CtxZipConfig {
    /// Load from `path` (default: `./ctxzip.toml`) with an optional CLI storage override.
    pub fn new(path: Option<PathBuf>, cli_storage: Option<String>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let toml = CtxZipToml::load_or_default(&path)?;
        Ok(Self {
            path,
            toml,
            cli_storage,
        })
    }

    /// Storage URI (CLI → env → file).
    pub fn storage(&self) -> Option<String> {
        self.cli_storage.clone().or_else(|| self.toml.storage())
    }

    pub fn compact_options(&self) -> Result<CompactOptions, ConfigError> {
        let mut options = self.toml.to_compact_options()?;
        options.storage = StorageSpec::from(self.storage());
        Ok(options)
    }

    pub fn grep_options(&self) -> GrepOptions {
        self.toml.grep_options()
    }

    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Run `f` with `CTXZIP_STORAGE` set to `value` (or unset), restoring it afterwards.
    fn with_storage_env<T>(value: Option<&str>, f: impl FnOnce() -> T) -> T {
        let _guard = ENV_MUTEX.lock().unwrap();
        let saved = std::env::var(STORAGE_ENV).ok();
        match value {
            Some(value) => unsafe { std::env::set_var(STORAGE_ENV, value) },
            None => unsafe { std::env::remove_var(STORAGE_ENV) },
        }
        let result = f();
        match saved {
            Some(saved) => unsafe { std::env::set_var(STORAGE_ENV, saved) },
            None => unsafe { std::env::remove_var(STORAGE_ENV) },
        }
        result
    }

    #[test]
    fn test_defaults() {
        let toml = CtxZipToml::parse("").unwrap();
        assert_eq!(toml, CtxZipToml::default());
        assert_eq!(toml.compaction.strategy, "write-tool-results-to-storage");
        assert_eq!(toml.search.max_results, 100);
        assert!(toml.validate().is_empty());

        let options = with_storage_env(None, || toml.to_compact_options().unwrap());
        assert_eq!(options.boundary, Boundary::SinceLastAssistantOrUserText);
        assert!(matches!(options.storage, StorageSpec::Default));
        assert!(options.is_reader_tool("readFile"));
    }

    #[test]
    fn test_parse_full_config() {
        let content = r#"
[compaction]
storage = "memory://config-test"
boundary = { type = "first-n-messages", count = 2 }
key_strategy = "random"
failure_policy = "best-effort"
storage_reader_tool_names = ["fetchStored"]

[search]
max_results = 5
context_lines = 2
"#;
        let toml = CtxZipToml::parse(content).unwrap();
        let options = with_storage_env(None, || toml.to_compact_options().unwrap());
        assert_eq!(options.boundary, Boundary::FirstNMessages { count: 2 });
        assert_eq!(options.key_strategy, KeyStrategy::Random);
        assert_eq!(options.failure_policy, FailurePolicy::BestEffort);
        assert!(options.is_reader_tool("fetchStored"));
        assert!(!options.is_reader_tool("readFile"));
        assert!(matches!(options.storage, StorageSpec::Uri(ref uri) if uri == "memory://config-test"));

        let grep = toml.grep_options();
        assert_eq!(grep.max_results, 5);
        assert_eq!(grep.context_lines, 2);
    }

    #[test]
    fn test_named_boundary() {
        let toml = CtxZipToml::parse("[compaction]\nboundary = \"entire-conversation\"\n").unwrap();
        assert_eq!(toml.boundary().unwrap(), Boundary::EntireConversation);
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let content = r#"
[compaction]
strategy = "summarize"
boundary = "latest"
key_strategy = "sequential"
failure_policy = "retry"
storage = "s3://bucket/prefix"

[search]
max_results = 0
"#;
        let toml = CtxZipToml::parse(content).unwrap();
        let warnings = toml.validate();
        assert_eq!(warnings.len(), 6);
        assert!(warnings.iter().any(|w| w.contains("summarize")));
        assert!(warnings.iter().any(|w| w.contains("latest")));
        assert!(warnings.iter().any(|w| w.contains("sequential")));
        assert!(warnings.iter().any(|w| w.contains("retry")));
        assert!(warnings.iter().any(|w| w.contains("s3")));
        assert!(warnings.iter().any(|w| w.contains("max_results")));

        assert!(matches!(
            toml.to_compact_options(),
            Err(ConfigError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_env_overrides_file_storage() {
        let toml = CtxZipToml::parse("[compaction]\nstorage = \"memory://from-file\"\n").unwrap();
        let storage = with_storage_env(Some("memory://from-env"), || toml.storage());
        assert_eq!(storage.as_deref(), Some("memory://from-env"));

        let storage = with_storage_env(None, || toml.storage());
        assert_eq!(storage.as_deref(), Some("memory://from-file"));
    }

    #[test]
    fn test_cli_overrides_env() {
        let dir = tempdir().unwrap();
        let config = CtxZipConfig::new(
            Some(dir.path().join("missing.toml")),
            Some("memory://from-cli".to_string()),
        )
        .unwrap();
        let storage = with_storage_env(Some("memory://from-env"), || config.storage());
        assert_eq!(storage.as_deref(), Some("memory://from-cli"));

        let options = config.compact_options().unwrap();
        assert!(matches!(options.storage, StorageSpec::Uri(ref uri) if uri == "memory://from-cli"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ctxzip.toml");

        let mut toml = CtxZipToml::default();
        toml.compaction.storage = Some("file:///var/tmp/ctxzip".to_string());
        toml.compaction.boundary = BoundarySpec::from(Boundary::FirstNMessages { count: 3 });
        toml.search.context_lines = 1;
        toml.save(&path).unwrap();

        let loaded = CtxZipToml::load(&path).unwrap();
        assert_eq!(loaded, toml);
    }

    #[test]
    fn test_load_errors() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            CtxZipToml::load(&missing),
            Err(ConfigError::ReadFailed { .. })
        ));
        assert_eq!(CtxZipToml::load_or_default(&missing).unwrap(), CtxZipToml::default());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[compaction\nstorage = ").unwrap();
        assert!(matches!(
            CtxZipToml::load(&broken),
            Err(ConfigError::ParseFailed { .. })
        ));
    }
}

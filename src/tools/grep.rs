//! `grepAndSearchFile`: regex search over stored content.

use super::{ToolDefinition, error_guidance, invalid_arguments, resolve_known_key};
use crate::errors::{ConfigError, ToolError};
use crate::search::{GrepFlags, GrepMatch, GrepOptions, build_regex, grep_stream};
use crate::storage::{
    KnownKeys, StorageAdapter, StorageReadParams, StorageSpec, create_storage_adapter,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

const DESCRIPTION: &str = "Search for a pattern in a file that was previously written to storage.
Use the 'key' parameter with the value shown in 'Written to ... Key: <key>' messages.
Provide a regex pattern to search for, and optional flags (i for case-insensitive, m for multiline, s for dot-all).
Returns matching lines with line numbers.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepAndSearchFileArgs {
    pub key: String,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_results: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_lines: Option<usize>,
}

impl GrepAndSearchFileArgs {
    pub fn new(key: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            pattern: pattern.into(),
            ..Default::default()
        }
    }

    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = Some(flags.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepAndSearchFileOutput {
    pub key: String,
    pub pattern: String,
    pub flags: String,
    pub matches: Vec<GrepMatch>,
    pub storage: String,
}

/// Searches compacted content without loading it whole.
#[derive(Debug, Clone)]
pub struct GrepAndSearchFileTool {
    adapter: Arc<dyn StorageAdapter>,
    known_keys: Option<KnownKeys>,
    defaults: GrepOptions,
    description: Option<String>,
}

impl GrepAndSearchFileTool {
    pub const NAME: &'static str = "grepAndSearchFile";

    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            known_keys: None,
            defaults: GrepOptions::default(),
            description: None,
        }
    }

    pub fn from_storage(storage: &StorageSpec) -> Result<Self, ConfigError> {
        Ok(Self::new(create_storage_adapter(storage)?))
    }

    /// Only search keys registered in `known_keys`.
    pub fn with_known_keys(mut self, known_keys: KnownKeys) -> Self {
        self.known_keys = Some(known_keys);
        self
    }

    /// Options used when a call does not set them.
    pub fn with_defaults(mut self, defaults: GrepOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn storage(&self) -> String {
        self.adapter.identify()
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: Self::NAME.to_string(),
            description: self
                .description
                .clone()
                .unwrap_or_else(|| DESCRIPTION.to_string()),
            parameters: json!({
                "type": "object",
                "properties": {
                    "key": {
                        "type": "string",
                        "description": "The storage key shown in a 'Written to ... Key: <key>' message"
                    },
                    "pattern": {
                        "type": "string",
                        "description": "Regular expression matched against each line"
                    },
                    "flags": {
                        "type": "string",
                        "description": "Regex flags: i (case-insensitive), m (multiline), s (dot matches newline)"
                    },
                    "max_results": {
                        "type": "integer",
                        "minimum": 0,
                        "description": format!("Maximum matching lines to return (default {})", self.defaults.max_results)
                    },
                    "context_lines": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Lines of context to include before and after each match"
                    }
                },
                "required": ["key", "pattern"]
            }),
        }
    }

    /// Search the content stored under `key`.
    pub async fn grep(
        &self,
        key: &str,
        pattern: &str,
        flags: GrepFlags,
        options: &GrepOptions,
    ) -> Result<Vec<GrepMatch>, ToolError> {
        let regex = build_regex(pattern, flags)?;
        let resolved = resolve_known_key(self.adapter.as_ref(), self.known_keys.as_ref(), key)?;

        let chunks = self
            .adapter
            .open_read_stream(StorageReadParams::new(resolved))
            .await
            .map_err(|e| ToolError::from_storage(key, e))?;
        let matches = grep_stream(chunks, &regex, options)
            .await
            .map_err(|e| ToolError::from_storage(key, e))?;

        tracing::debug!(key, pattern, matches = matches.len(), "searched stored content");
        Ok(matches)
    }

    pub async fn call(
        &self,
        args: GrepAndSearchFileArgs,
    ) -> Result<GrepAndSearchFileOutput, ToolError> {
        let flags = args.flags.unwrap_or_default();
        let options = GrepOptions {
            max_results: args.max_results.unwrap_or(self.defaults.max_results),
            context_lines: args.context_lines.unwrap_or(self.defaults.context_lines),
        };
        let matches = self
            .grep(&args.key, &args.pattern, GrepFlags::parse(&flags), &options)
            .await?;
        Ok(GrepAndSearchFileOutput {
            key: args.key,
            pattern: args.pattern,
            flags,
            matches,
            storage: self.storage(),
        })
    }

    /// Run the tool on raw JSON arguments. Failures are reported in `content`.
    pub async fn call_json(&self, args: Value) -> Value {
        let args: GrepAndSearchFileArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(e) => return json!({ "content": invalid_arguments(&e), "storage": self.storage() }),
        };
        let (key, pattern, flags) = (
            args.key.clone(),
            args.pattern.clone(),
            args.flags.clone().unwrap_or_default(),
        );
        match self.call(args).await {
            Ok(output) => json!(output),
            Err(e @ ToolError::InvalidPattern { .. }) => json!({
                "key": key,
                "pattern": pattern,
                "flags": flags,
                "content": error_guidance("searching", &e),
            }),
            Err(e) => json!({
                "key": key,
                "pattern": pattern,
                "flags": flags,
                "content": error_guidance("searching", &e),
                "storage": self.storage(),
            }),
        }
    }
}

//! `readFile`: return the stored text for a key.

use super::{ToolDefinition, error_guidance, invalid_arguments, resolve_known_key};
use crate::errors::{ConfigError, ToolError};
use crate::storage::{
    ByteRange, KnownKeys, StorageAdapter, StorageReadParams, StorageSpec, create_storage_adapter,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::Arc;

const DESCRIPTION: &str = "Read a file that was previously written to storage during this conversation.
Use the 'key' parameter with the value shown in 'Written to ... Key: <key>' messages.
Optionally limit the result with 'start_line' (1-based) and 'max_lines', or with a byte range.
This tool can only read files that were written during the current conversation.";

/// Optional ranges for a read. The byte range is applied by the storage
/// adapter, the line range to the text it returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub byte_range: Option<ByteRange>,
    /// 1-based first line to return.
    pub start_line: Option<usize>,
    pub max_lines: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileArgs {
    /// Key from a `Written to ... Key: <key>` reference.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_start: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_end: Option<u64>,
}

impl ReadFileArgs {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    fn options(&self) -> ReadOptions {
        let byte_range = match (self.byte_start, self.byte_end) {
            (None, None) => None,
            (start, end) => Some(ByteRange::new(start.unwrap_or(0), end)),
        };
        ReadOptions {
            byte_range,
            start_line: self.start_line,
            max_lines: self.max_lines,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadFileOutput {
    pub key: String,
    pub content: String,
    pub storage: String,
}

/// Reads compacted content back out of storage.
#[derive(Debug, Clone)]
pub struct ReadFileTool {
    adapter: Arc<dyn StorageAdapter>,
    known_keys: Option<KnownKeys>,
    description: Option<String>,
}

impl ReadFileTool {
    pub const NAME: &'static str = "readFile";

    pub fn new(adapter: Arc<dyn StorageAdapter>) -> Self {
        Self {
            adapter,
            known_keys: None,
            description: None,
        }
    }

    pub fn from_storage(storage: &StorageSpec) -> Result<Self, ConfigError> {
        Ok(Self::new(create_storage_adapter(storage)?))
    }

    /// Only serve keys registered in `known_keys`, typically the compactor's.
    pub fn with_known_keys(mut self, known_keys: KnownKeys) -> Self {
        self.known_keys = Some(known_keys);
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
                    "start_line": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "First line to return (1-based)"
                    },
                    "max_lines": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Maximum number of lines to return"
                    },
                    "byte_start": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Start of a byte range to read"
                    },
                    "byte_end": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "End (exclusive) of a byte range to read"
                    }
                },
                "required": ["key"]
            }),
        }
    }

    /// Read the text stored under `key`.
    pub async fn read(&self, key: &str, options: &ReadOptions) -> Result<String, ToolError> {
        if let Some(range) = options.byte_range
            && let Some(end) = range.end
            && end < range.start
        {
            return Err(ToolError::InvalidRange(format!(
                "byte range end {} is before start {}",
                end, range.start
            )));
        }
        if options.start_line == Some(0) {
            return Err(ToolError::InvalidRange(
                "start_line is 1-based".to_string(),
            ));
        }

        let resolved = resolve_known_key(self.adapter.as_ref(), self.known_keys.as_ref(), key)?;
        let mut params = StorageReadParams::new(resolved);
        if let Some(range) = options.byte_range {
            params = params.with_range(range);
        }
        let text = self
            .adapter
            .read_text(params)
            .await
            .map_err(|e| ToolError::from_storage(key, e))?;

        tracing::debug!(key, bytes = text.len(), "read stored content");
        Ok(select_lines(text, options.start_line, options.max_lines))
    }

    pub async fn call(&self, args: ReadFileArgs) -> Result<ReadFileOutput, ToolError> {
        let content = self.read(&args.key, &args.options()).await?;
        Ok(ReadFileOutput {
            key: args.key,
            content,
            storage: self.storage(),
        })
    }

    /// Run the tool on raw JSON arguments. Failures are reported in `content`.
    pub async fn call_json(&self, args: Value) -> Value {
        let args: ReadFileArgs = match serde_json::from_value(args) {
            Ok(args) => args,
            Err(e) => return json!({ "content": invalid_arguments(&e), "storage": self.storage() }),
        };
        let key = args.key.clone();
        match self.call(args).await {
            Ok(output) => json!(output),
            Err(e) => json!({
                "key": key,
                "content": error_guidance("reading", &e),
                "storage": self.storage(),
            }),
        }
    }
}

/// Keep `max_lines` lines starting at 1-based `start_line`, with terminators.
fn select_lines(text: String, start_line: Option<usize>, max_lines: Option<usize>) -> String {
    if start_line.is_none() && max_lines.is_none() {
        return text;
    }
    let skip = start_line.unwrap_or(1).saturating_sub(1);
    let take = max_lines.unwrap_or(usize::MAX);
    text.split_inclusive('\n').skip(skip).take(take).collect()
}

//! Reader tools for retrieving compacted content.
//!
//! Two tools are exposed to the model:
//!
//! - [`ReadFileTool`] (`readFile`) returns the stored text for a key
//! - [`GrepAndSearchFileTool`] (`grepAndSearchFile`) searches it line by line
//!
//! Both have a typed `call` for Rust callers and a `call_json` that speaks
//! the JSON shapes handed to the model, including error guidance.

mod grep;
mod read;

pub use grep::{GrepAndSearchFileArgs, GrepAndSearchFileOutput, GrepAndSearchFileTool};
pub use read::{ReadFileArgs, ReadFileOutput, ReadFileTool, ReadOptions};

use crate::errors::ToolError;
use crate::storage::{KnownKeys, StorageAdapter};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returned to the model for keys this conversation never produced.
pub const UNKNOWN_KEY_GUIDANCE: &str = "Tool cannot be used: unknown key. Use a key previously surfaced via \
'Written to ... Key: <key>' or 'Read from storage ... Key: <key>'. \
If none exists, re-run the producing tool to persist and get a key.";

/// Name, description and JSON-schema parameters of a tool, as handed to an LLM.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Resolve `key` through the adapter and, when a registry is attached,
/// reject keys that were not written to this storage.
fn resolve_known_key(
    adapter: &dyn StorageAdapter,
    known_keys: Option<&KnownKeys>,
    key: &str,
) -> Result<String, ToolError> {
    let resolved = adapter.resolve_key(key);
    if let Some(known_keys) = known_keys
        && !known_keys.is_known(&adapter.identify(), &resolved)
    {
        tracing::debug!(key, "rejecting unknown key");
        return Err(ToolError::UnknownKey {
            key: key.to_string(),
        });
    }
    Ok(resolved)
}

/// The `content` string shown to the model when a tool call fails.
fn error_guidance(action: &str, err: &ToolError) -> String {
    match err {
        ToolError::UnknownKey { .. } => UNKNOWN_KEY_GUIDANCE.to_string(),
        ToolError::InvalidPattern { source, .. } => format!("Invalid regex: {}", source),
        other => format!(
            "Error {} file: {}. Are you sure the storage is correct? If yes, make the original \
             tool call again with the same arguments instead of relying on readFile or \
             grepAndSearchFile.",
            action, other
        ),
    }
}

/// The `content` string for arguments that do not parse.
fn invalid_arguments(err: &serde_json::Error) -> String {
    format!("Invalid arguments: {}", err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorageAdapter;

    #[test]
    fn test_resolve_known_key() {
        let adapter = MemoryStorageAdapter::new("tools-mod").with_prefix("p");
        let keys = KnownKeys::new();
        keys.register("memory://tools-mod/p", "p/a.txt");

        assert_eq!(resolve_known_key(&adapter, None, "b.txt").unwrap(), "p/b.txt");
        assert_eq!(
            resolve_known_key(&adapter, Some(&keys), "a.txt").unwrap(),
            "p/a.txt"
        );
        assert_eq!(
            resolve_known_key(&adapter, Some(&keys), "p/a.txt").unwrap(),
            "p/a.txt"
        );
        assert!(matches!(
            resolve_known_key(&adapter, Some(&keys), "b.txt"),
            Err(ToolError::UnknownKey { ref key }) if key == "b.txt"
        ));
    }

    #[test]
    fn test_error_guidance() {
        let unknown = ToolError::UnknownKey {
            key: "x".to_string(),
        };
        assert_eq!(error_guidance("reading", &unknown), UNKNOWN_KEY_GUIDANCE);

        let missing = ToolError::NotFound {
            key: "x".to_string(),
        };
        let text = error_guidance("reading", &missing);
        assert!(text.starts_with("Error reading file: Key not found: x."));
        assert!(text.contains("make the original tool call again"));
    }
}

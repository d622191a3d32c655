//! ctxzip: compact LLM conversation histories.
//!
//! Large tool results inside the compaction window are written to a storage
//! backend and replaced by a one-line reference. The [`tools`] module gives
//! the model `readFile` and `grepAndSearchFile` to get the content back.

pub mod compaction;
pub mod config;
pub mod errors;
pub mod message;
pub mod search;
pub mod storage;
pub mod tools;

pub use compaction::{
    Boundary, CompactOptions, CompactionReport, Compactor, compact_messages,
    compact_messages_blocking,
};
pub use errors::{CompactError, ConfigError, StorageError, ToolError};
pub use message::{ContentBlock, Message, Role, ToolResult, ToolResultOutput};
pub use storage::{KnownKeys, StorageAdapter, StorageSpec};
pub use tools::{GrepAndSearchFileTool, ReadFileTool};

//! Conversation compaction.
//!
//! Large tool results are written to a storage backend and replaced in the
//! conversation by a short reference string:
//!
//! ```text
//! Written to file:///tmp/ctxzip_1f2e. Key: 9b74c9897bac770ffc029102a200c5de.txt. Use the read/search tools to inspect its contents.
//! ```
//!
//! The agent can later fetch the content back with the reader tools in
//! [`crate::tools`].
//!
//! ## Window
//!
//! Only messages at or after the [`Boundary`] index are touched. The default
//! boundary starts right after the most recent user/assistant turn with text,
//! so tool results the model is still working with stay intact.
//!
//! ## Usage
//!
//! ```no_run
//! use ctxzip::compaction::{Boundary, CompactOptions, Compactor};
//! use ctxzip::message::Message;
//!
//! # async fn run(messages: Vec<Message>) -> Result<(), Box<dyn std::error::Error>> {
//! let options = CompactOptions::default()
//!     .with_storage("file:///var/tmp/ctxzip")
//!     .with_boundary(Boundary::EntireConversation);
//! let compactor = Compactor::from_options(options)?;
//!
//! let compacted = compactor.compact(&messages).await?;
//! // Compacting again with the same compactor is a no-op.
//! assert_eq!(compactor.compact(&compacted).await?, compacted);
//! # Ok(())
//! # }
//! ```

mod boundary;
mod config;
mod engine;
mod reference;
mod summary;

pub use boundary::{Boundary, BoundarySpec};
pub use config::{
    CompactOptions, DEFAULT_READER_TOOL_NAMES, FailurePolicy, KeyStrategy, Serializer, Strategy,
};
pub use engine::{Compactor, compact_messages, compact_messages_blocking};
pub use reference::{extract_reference_keys, format_reference};
pub use summary::{BlockFailure, CompactionReport};

/// Index of the first message eligible for compaction under `boundary`.
pub fn detect_window_start(messages: &[crate::message::Message], boundary: &Boundary) -> usize {
    boundary.window_start(messages)
}

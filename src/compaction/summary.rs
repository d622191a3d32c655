//! Compaction report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A block that could not be persisted under the best-effort policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockFailure {
    /// Index of the message holding the block.
    pub message_index: usize,
    pub tool_name: String,
    /// Rendered error.
    pub error: String,
}

/// What a compaction run did.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionReport {
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    /// Storage identity the results were written to.
    pub storage: String,
    /// First message index eligible for compaction.
    pub window_start: usize,
    /// Messages inside the window.
    pub messages_scanned: usize,
    /// Blocks whose content was written to storage.
    pub blocks_written: usize,
    /// Blocks replaced by a reference to content already written in this run.
    pub blocks_deduplicated: usize,
    /// Results of reader tools, left untouched.
    pub reader_results_skipped: usize,
    /// Blocks that already hold a known reference.
    pub known_references_skipped: usize,
    /// Bytes persisted across all writes.
    pub bytes_persisted: usize,
    /// Characters of the reference strings that replaced the persisted content.
    pub reference_chars: usize,
    /// Keys written, in write order.
    pub keys_written: Vec<String>,
    /// Best-effort failures.
    pub failures: Vec<BlockFailure>,
}

impl CompactionReport {
    pub fn new(storage: impl Into<String>, window_start: usize, messages_scanned: usize) -> Self {
        Self {
            generated_at: Utc::now(),
            storage: storage.into(),
            window_start,
            messages_scanned,
            blocks_written: 0,
            blocks_deduplicated: 0,
            reader_results_skipped: 0,
            known_references_skipped: 0,
            bytes_persisted: 0,
            reference_chars: 0,
            keys_written: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Blocks replaced by a reference in this run.
    pub fn blocks_compacted(&self) -> usize {
        self.blocks_written + self.blocks_deduplicated
    }

    /// Approximate characters removed from the conversation.
    ///
    /// Deduplicated blocks are not counted since their size is not tracked.
    pub fn chars_saved(&self) -> usize {
        self.bytes_persisted.saturating_sub(self.reference_chars)
    }

    /// Whether the run left the conversation unchanged.
    pub fn is_noop(&self) -> bool {
        self.blocks_compacted() == 0
    }

    /// Get a brief status for logging.
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "Compacted {} tool result(s) from message {} ({} written, {} deduplicated): {} bytes persisted to {}",
            self.blocks_compacted(),
            self.window_start,
            self.blocks_written,
            self.blocks_deduplicated,
            self.bytes_persisted,
            self.storage
        );
        if !self.failures.is_empty() {
            line.push_str(&format!(", {} failed", self.failures.len()));
        }
        line
    }
}

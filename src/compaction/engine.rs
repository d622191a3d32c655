//! The compaction engine.
//!
//! Walks the messages inside the compaction window, writes eligible tool
//! results through the storage adapter, and swaps their output for a
//! reference string. The input slice is never modified.

use super::config::{CompactOptions, FailurePolicy, KeyStrategy, Strategy};
use super::reference::{extract_reference_keys, format_reference};
use super::summary::{BlockFailure, CompactionReport};
use crate::errors::{CompactError, ConfigError};
use crate::message::{ContentBlock, Message, ToolResult, ToolResultOutput};
use crate::storage::{KnownKeys, StorageAdapter, StorageWriteParams, create_storage_adapter};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

/// Compacts conversations into one storage backend.
///
/// A `Compactor` owns the [`KnownKeys`] it registers written keys in. Reuse
/// the same instance (or share its keys with [`Compactor::with_known_keys`])
/// across turns of a conversation so that already-compacted results are
/// recognized.
#[derive(Debug, Clone)]
pub struct Compactor {
    adapter: Arc<dyn StorageAdapter>,
    options: CompactOptions,
    known_keys: KnownKeys,
}

/// Per-call state.
struct Pass<'a> {
    identity: &'a str,
    written: HashSet<String>,
    report: CompactionReport,
}

impl Compactor {
    /// Create a compactor writing to `adapter`. `options.storage` is ignored.
    pub fn new(adapter: Arc<dyn StorageAdapter>, options: CompactOptions) -> Self {
        Self {
            adapter,
            options,
            known_keys: KnownKeys::new(),
        }
    }

    /// Create a compactor, resolving `options.storage` into an adapter.
    pub fn from_options(options: CompactOptions) -> Result<Self, ConfigError> {
        let adapter = create_storage_adapter(&options.storage)?;
        Ok(Self::new(adapter, options))
    }

    /// Use an existing key registry, e.g. one shared with reader tools.
    pub fn with_known_keys(mut self, known_keys: KnownKeys) -> Self {
        self.known_keys = known_keys;
        self
    }

    pub fn known_keys(&self) -> &KnownKeys {
        &self.known_keys
    }

    pub fn adapter(&self) -> &Arc<dyn StorageAdapter> {
        &self.adapter
    }

    pub fn options(&self) -> &CompactOptions {
        &self.options
    }

    /// Compact `messages` and return the new sequence.
    pub async fn compact(&self, messages: &[Message]) -> Result<Vec<Message>, CompactError> {
        self.compact_with_report(messages)
            .await
            .map(|(messages, _)| messages)
    }

    /// Compact `messages`, also returning what was done.
    pub async fn compact_with_report(
        &self,
        messages: &[Message],
    ) -> Result<(Vec<Message>, CompactionReport), CompactError> {
        match self.options.strategy {
            Strategy::WriteToolResultsToStorage => self.write_tool_results(messages).await,
        }
    }

    /// Blocking form of [`Compactor::compact`].
    ///
    /// Drives the same future on a private current-thread runtime. When called
    /// from inside a tokio runtime, the private runtime runs on a scoped helper
    /// thread.
    pub fn compact_blocking(&self, messages: &[Message]) -> Result<Vec<Message>, CompactError> {
        block_on(self.compact(messages))?
    }

    async fn write_tool_results(
        &self,
        messages: &[Message],
    ) -> Result<(Vec<Message>, CompactionReport), CompactError> {
        let identity = self.adapter.identify();
        let window_start = self.options.boundary.window_start(messages);
        let mut output = messages.to_vec();

        let mut pass = Pass {
            identity: &identity,
            written: HashSet::new(),
            report: CompactionReport::new(
                identity.as_str(),
                window_start,
                messages.len() - window_start,
            ),
        };

        tracing::debug!(
            storage = %identity,
            window_start,
            messages = messages.len(),
            boundary = %self.options.boundary,
            "starting compaction"
        );

        for (index, message) in output.iter_mut().enumerate().skip(window_start) {
            for block in message.blocks_mut() {
                let ContentBlock::ToolResult(result) = block else {
                    continue;
                };
                if let Err(err) = self.compact_block(index, result, &mut pass).await {
                    match self.options.failure_policy {
                        FailurePolicy::FailFast => return Err(err),
                        FailurePolicy::BestEffort => {
                            tracing::warn!(
                                message_index = index,
                                tool_name = %result.tool_name(),
                                error = %err,
                                "leaving tool result in place"
                            );
                            pass.report.failures.push(BlockFailure {
                                message_index: index,
                                tool_name: result.tool_name().to_string(),
                                error: err.to_string(),
                            });
                        }
                    }
                }
            }
        }

        if !pass.report.is_noop() {
            tracing::info!("{}", pass.report.summary_line());
        }
        Ok((output, pass.report))
    }

    async fn compact_block(
        &self,
        message_index: usize,
        result: &mut ToolResult,
        pass: &mut Pass<'_>,
    ) -> Result<(), CompactError> {
        if self.options.is_reader_tool(result.tool_name()) {
            pass.report.reader_results_skipped += 1;
            return Ok(());
        }

        let rendered = result.output.rendered();
        let already_stored = extract_reference_keys(&rendered)
            .into_iter()
            .any(|key| self.known_keys.is_known(pass.identity, key));
        if already_stored {
            pass.report.known_references_skipped += 1;
            return Ok(());
        }

        let Some(body) = self.persistable_body(message_index, result)? else {
            return Ok(());
        };

        let key = self.adapter.resolve_key(&self.logical_name(&body));
        if pass.written.contains(&key) || self.known_keys.is_known(pass.identity, &key) {
            tracing::debug!(message_index, key = %key, "content already stored");
            pass.report.blocks_deduplicated += 1;
        } else {
            let bytes = body.len();
            self.adapter
                .write(StorageWriteParams::text(key.clone(), body))
                .await
                .map_err(|source| CompactError::StorageWrite {
                    message_index,
                    tool_name: result.tool_name().to_string(),
                    key: key.clone(),
                    source,
                })?;

            // Only a confirmed write makes the key trusted.
            self.known_keys.register(pass.identity, &key);
            pass.written.insert(key.clone());

            tracing::debug!(
                message_index,
                tool_name = %result.tool_name(),
                key = %key,
                bytes,
                "persisted tool result"
            );
            pass.report.blocks_written += 1;
            pass.report.bytes_persisted += bytes;
            pass.report.keys_written.push(key.clone());
        }

        let reference = format_reference(pass.identity, &key);
        pass.report.reference_chars += reference.len();
        // Provider fields on the output survive; a stale `text` payload does not.
        let mut extra = result.output.extra().clone();
        extra.remove("text");
        result.output = ToolResultOutput::text(reference).with_extra(extra);
        Ok(())
    }

    /// The text to persist for a tool result, or `None` if it is not eligible.
    fn persistable_body(
        &self,
        message_index: usize,
        result: &ToolResult,
    ) -> Result<Option<String>, CompactError> {
        let body = match &result.output {
            ToolResultOutput::Text { value, .. } => value.clone(),
            ToolResultOutput::Json {
                value: Value::String(value),
                ..
            } => value.clone(),
            ToolResultOutput::Json { value, .. } => self
                .options
                .serialize_result
                .serialize(value)
                .map_err(|source| CompactError::Serialization {
                    message_index,
                    tool_name: result.tool_name().to_string(),
                    source,
                })?,
            ToolResultOutput::ErrorText { .. } | ToolResultOutput::ErrorJson { .. } => {
                return Ok(None);
            }
        };
        Ok((!body.is_empty()).then_some(body))
    }

    fn logical_name(&self, body: &str) -> String {
        match self.options.key_strategy {
            KeyStrategy::ContentHash => format!("{}.txt", hex::encode(Sha256::digest(body))),
            KeyStrategy::Random => format!("{}.txt", uuid::Uuid::new_v4()),
        }
    }
}

/// Compact `messages` with a one-shot [`Compactor`] built from `options`.
///
/// Each call starts with an empty key registry, so references produced by an
/// earlier call are not recognized. Keep a [`Compactor`] around for multi-turn
/// use.
pub async fn compact_messages(
    messages: &[Message],
    options: CompactOptions,
) -> Result<Vec<Message>, CompactError> {
    Compactor::from_options(options)?.compact(messages).await
}

/// Blocking form of [`compact_messages`].
pub fn compact_messages_blocking(
    messages: &[Message],
    options: CompactOptions,
) -> Result<Vec<Message>, CompactError> {
    Compactor::from_options(options)?.compact_blocking(messages)
}

fn block_on<F>(future: F) -> Result<F::Output, CompactError>
where
    F: Future + Send,
    F::Output: Send,
{
    if tokio::runtime::Handle::try_current().is_err() {
        return run_on_private_runtime(future);
    }
    std::thread::scope(|scope| {
        scope
            .spawn(move || run_on_private_runtime(future))
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
    })
}

fn run_on_private_runtime<F: Future>(future: F) -> Result<F::Output, CompactError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CompactError::Runtime)?;
    Ok(runtime.block_on(future))
}

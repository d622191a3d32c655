//! Line-oriented regex search over stored content.
//!
//! Content arrives as a stream of byte chunks. Lines are reassembled across
//! chunk boundaries (including UTF-8 sequences split between chunks) and
//! numbered from 1, so the result never depends on how the content was
//! chunked. Each matching line yields exactly one [`GrepMatch`].

use crate::errors::{StorageError, ToolError};
use crate::storage::ChunkStream;
use futures::TryStreamExt;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Default cap on returned matches.
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// Regex flags accepted as a string such as `"im"`.
///
/// `i` case-insensitive, `m` multi-line, `s` dot matches newline. Other
/// characters are ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GrepFlags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
}

impl GrepFlags {
    pub fn parse(flags: &str) -> Self {
        Self {
            case_insensitive: flags.contains('i'),
            multi_line: flags.contains('m'),
            dot_matches_new_line: flags.contains('s'),
        }
    }
}

impl std::fmt::Display for GrepFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.case_insensitive {
            f.write_str("i")?;
        }
        if self.multi_line {
            f.write_str("m")?;
        }
        if self.dot_matches_new_line {
            f.write_str("s")?;
        }
        Ok(())
    }
}

/// Compile `pattern` with `flags`.
pub fn build_regex(pattern: &str, flags: GrepFlags) -> Result<Regex, ToolError> {
    RegexBuilder::new(pattern)
        .case_insensitive(flags.case_insensitive)
        .multi_line(flags.multi_line)
        .dot_matches_new_line(flags.dot_matches_new_line)
        .build()
        .map_err(|source| ToolError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepOptions {
    /// Stop after this many matches.
    pub max_results: usize,
    /// Lines of context to attach before and after each match.
    pub context_lines: usize,
}

impl Default for GrepOptions {
    fn default() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
            context_lines: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLine {
    pub line_number: usize,
    pub content: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchContext {
    pub before: Vec<ContextLine>,
    pub after: Vec<ContextLine>,
}

/// A matching line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepMatch {
    /// 1-based line number.
    pub line_number: usize,
    /// The line, without its terminator.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MatchContext>,
}

impl std::fmt::Display for GrepMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.line_number, self.content)
    }
}

/// Search a chunk stream line by line.
///
/// Reading stops as soon as `max_results` matches (and their trailing
/// context) have been collected.
pub async fn grep_stream(
    mut chunks: ChunkStream,
    regex: &Regex,
    options: &GrepOptions,
) -> Result<Vec<GrepMatch>, StorageError> {
    let mut splitter = LineSplitter::default();
    let mut matcher = Matcher::new(regex, options);

    while !matcher.is_complete() {
        let Some(chunk) = chunks.try_next().await? else {
            break;
        };
        for (line_number, line) in splitter.push(&chunk) {
            matcher.feed(line_number, line);
        }
    }
    if let Some((line_number, line)) = splitter.finish() {
        matcher.feed(line_number, line);
    }
    Ok(matcher.into_matches())
}

/// Search an in-memory string. Equivalent to [`grep_stream`] over a single chunk.
pub fn grep_text(text: &str, regex: &Regex, options: &GrepOptions) -> Vec<GrepMatch> {
    let mut splitter = LineSplitter::default();
    let mut matcher = Matcher::new(regex, options);

    for (line_number, line) in splitter.push(text.as_bytes()) {
        matcher.feed(line_number, line);
    }
    if let Some((line_number, line)) = splitter.finish() {
        matcher.feed(line_number, line);
    }
    matcher.into_matches()
}

/// Splits a byte stream into numbered lines.
///
/// The unterminated tail of each chunk is carried as raw bytes and only
/// decoded once its line is complete.
#[derive(Debug, Default)]
struct LineSplitter {
    carry: Vec<u8>,
    lines_emitted: usize,
}

impl LineSplitter {
    fn push(&mut self, chunk: &[u8]) -> Vec<(usize, String)> {
        // The carry never holds a newline, so only the new bytes need scanning.
        let mut search_from = self.carry.len();
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.carry[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + offset;
            self.lines_emitted += 1;
            lines.push((self.lines_emitted, decode_line(&self.carry[start..end])));
            start = end + 1;
            search_from = start;
        }
        self.carry.drain(..start);
        lines
    }

    /// The final unterminated line, if any.
    fn finish(&mut self) -> Option<(usize, String)> {
        if self.carry.is_empty() {
            return None;
        }
        self.lines_emitted += 1;
        let line = decode_line(&self.carry);
        self.carry.clear();
        Some((self.lines_emitted, line))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

struct Matcher<'a> {
    regex: &'a Regex,
    options: &'a GrepOptions,
    matches: Vec<GrepMatch>,
    before: VecDeque<ContextLine>,
    /// Matches still collecting trailing context.
    awaiting_after: Vec<usize>,
}

impl<'a> Matcher<'a> {
    fn new(regex: &'a Regex, options: &'a GrepOptions) -> Self {
        Self {
            regex,
            options,
            matches: Vec::new(),
            before: VecDeque::with_capacity(options.context_lines),
            awaiting_after: Vec::new(),
        }
    }

    fn is_complete(&self) -> bool {
        self.matches.len() >= self.options.max_results && self.awaiting_after.is_empty()
    }

    fn feed(&mut self, line_number: usize, content: String) {
        if self.is_complete() {
            return;
        }
        let context_lines = self.options.context_lines;

        if context_lines > 0 {
            for &index in &self.awaiting_after {
                if let Some(context) = self.matches[index].context.as_mut() {
                    context.after.push(ContextLine {
                        line_number,
                        content: content.clone(),
                    });
                }
            }
            let matches = &self.matches;
            self.awaiting_after.retain(|&index| {
                matches[index]
                    .context
                    .as_ref()
                    .is_some_and(|context| context.after.len() < context_lines)
            });
        }

        if self.matches.len() < self.options.max_results && self.regex.is_match(&content) {
            let context = (context_lines > 0).then(|| MatchContext {
                before: self.before.iter().cloned().collect(),
                after: Vec::new(),
            });
            if context.is_some() {
                self.awaiting_after.push(self.matches.len());
            }
            self.matches.push(GrepMatch {
                line_number,
                content: content.clone(),
                context,
            });
        }

        if context_lines > 0 {
            if self.before.len() == context_lines {
                self.before.pop_front();
            }
            self.before.push_back(ContextLine {
                line_number,
                content,
            });
        }
    }

    fn into_matches(self) -> Vec<GrepMatch> {
        self.matches
    }
}

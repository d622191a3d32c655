//! Reference strings substituted for compacted content.
//!
//! A reference has the fixed form
//!
//! ```text
//! Written to {identity}. Key: {key}. Use the read/search tools to inspect its contents.
//! ```
//!
//! and is parsed back by looking for `Key: <key>`.

use regex::Regex;
use std::sync::LazyLock;

static KEY_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Key: (\S+)").unwrap());

/// Build the reference string for a stored key.
pub fn format_reference(identity: &str, key: &str) -> String {
    format!(
        "Written to {}. Key: {}. Use the read/search tools to inspect its contents.",
        identity, key
    )
}

/// Every key embedded in `text` via `Key: <key>`.
///
/// The sentence-ending period after the key is not part of the key.
pub fn extract_reference_keys(text: &str) -> Vec<&str> {
    KEY_REGEX
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| {
            let key = m.as_str();
            key.strip_suffix('.').unwrap_or(key)
        })
        .filter(|key| !key.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_reference() {
        assert_eq!(
            format_reference("file:///tmp/ctx", "abc.txt"),
            "Written to file:///tmp/ctx. Key: abc.txt. Use the read/search tools to inspect its contents."
        );
    }

    #[test]
    fn test_extract_from_reference() {
        let reference = format_reference("memory://s/conv-1", "conv-1/abc.txt");
        assert_eq!(extract_reference_keys(&reference), vec!["conv-1/abc.txt"]);
    }

    #[test]
    fn test_extract_multiple_and_none() {
        assert!(extract_reference_keys("no references here").is_empty());
        assert!(extract_reference_keys("Key: ").is_empty());
        assert_eq!(
            extract_reference_keys("Key: a.txt. and later Key: b.txt"),
            vec!["a.txt", "b.txt"]
        );
    }
}

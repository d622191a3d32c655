//! Integration tests for ctxzip
//!
//! These tests drive the binary end to end: compaction writes to a real
//! directory and the reader commands get the content back.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use ctxzip::compaction::extract_reference_keys;
use ctxzip::storage::file_uri_from_dir;
use predicates::prelude::*;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

/// Helper to create a ctxzip Command isolated from the caller's environment
fn ctxzip(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("ctxzip");
    cmd.current_dir(dir.path())
        .env_remove("CTXZIP_STORAGE")
        .env_remove("CTXZIP_LOG");
    cmd
}

/// Storage URI for a `store` directory inside `dir`
fn storage_uri(dir: &TempDir) -> String {
    let store = dir.path().join("store");
    fs::create_dir_all(&store).unwrap();
    file_uri_from_dir(&store)
}

fn log_output() -> String {
    (1..=200)
        .map(|i| {
            if i % 50 == 0 {
                format!("{:04} ERROR upstream timeout", i)
            } else {
                format!("{:04} INFO request ok", i)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// user turn, assistant tool call, then a large tool result in the window
fn conversation() -> Value {
    json!([
        {"role": "user", "content": "why are requests failing?"},
        {"role": "assistant", "content": [
            {"type": "tool-call", "toolCallId": "call_1", "toolName": "fetchLogs", "input": {"service": "api"}}
        ]},
        {"role": "tool", "content": [
            {"type": "tool-result", "toolCallId": "call_1", "toolName": "fetchLogs",
             "output": {"type": "text", "value": log_output()}}
        ]}
    ])
}

fn compact(dir: &TempDir, storage: &str, input: &Value) -> Value {
    let output = ctxzip(dir)
        .args(["--storage", storage, "compact"])
        .write_stdin(input.to_string())
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).unwrap()
}

fn reference_of(compacted: &Value) -> String {
    compacted[2]["content"][0]["output"]["value"]
        .as_str()
        .unwrap()
        .to_string()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_ctxzip_help() {
        let dir = TempDir::new().unwrap();
        ctxzip(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("compact"))
            .stdout(predicate::str::contains("grep"));
    }

    #[test]
    fn test_ctxzip_version() {
        let dir = TempDir::new().unwrap();
        ctxzip(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_subcommand_fails() {
        let dir = TempDir::new().unwrap();
        ctxzip(&dir).arg("summarize").assert().failure();
    }

    #[test]
    fn test_tools_prints_definitions() {
        let dir = TempDir::new().unwrap();
        let output = ctxzip(&dir)
            .arg("tools")
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let definitions: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(definitions[0]["name"], "readFile");
        assert_eq!(definitions[1]["name"], "grepAndSearchFile");
    }
}

// =============================================================================
// Compaction Tests
// =============================================================================

mod compaction {
    use super::*;

    #[test]
    fn test_compact_replaces_tool_result_with_reference() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);

        let compacted = compact(&dir, &storage, &conversation());
        let reference = reference_of(&compacted);
        assert!(reference.starts_with("Written to file://"));
        assert!(reference.ends_with("Use the read/search tools to inspect its contents."));

        let keys = extract_reference_keys(&reference);
        assert_eq!(keys.len(), 1);
        let stored = fs::read_to_string(dir.path().join("store").join(keys[0])).unwrap();
        assert_eq!(stored, log_output());

        // Everything outside the tool result is untouched.
        assert_eq!(compacted[0], conversation()[0]);
        assert_eq!(compacted[1], conversation()[1]);
        assert_eq!(compacted[2]["content"][0]["toolCallId"], "call_1");
    }

    #[test]
    fn test_compact_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);

        let once = compact(&dir, &storage, &conversation());
        let twice = compact(&dir, &storage, &once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_compact_respects_boundary() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        let mut input = conversation();
        input
            .as_array_mut()
            .unwrap()
            .push(json!({"role": "assistant", "content": "The upstream is timing out."}));

        // Default window starts after the final assistant text: nothing to do.
        let untouched = compact(&dir, &storage, &input);
        assert_eq!(untouched, input);

        let output = ctxzip(&dir)
            .args(["--storage", storage.as_str(), "compact", "--boundary", "entire-conversation"])
            .write_stdin(input.to_string())
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let compacted: Value = serde_json::from_slice(&output).unwrap();
        assert!(reference_of(&compacted).starts_with("Written to "));
    }

    #[test]
    fn test_compact_files_and_report() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        let input_path = dir.path().join("in.json");
        let output_path = dir.path().join("out.json");
        fs::write(&input_path, conversation().to_string()).unwrap();

        let assert = ctxzip(&dir)
            .args(["--storage", storage.as_str(), "compact", "--report", "--input"])
            .arg(&input_path)
            .arg("--output")
            .arg(&output_path)
            .assert()
            .success();
        let report: Value = serde_json::from_slice(&assert.get_output().stderr).unwrap();
        assert_eq!(report["blocks_written"], 1);
        assert_eq!(report["window_start"], 1);

        let compacted: Value =
            serde_json::from_str(&fs::read_to_string(&output_path).unwrap()).unwrap();
        assert!(reference_of(&compacted).starts_with("Written to "));
    }

    #[test]
    fn test_compact_rejects_invalid_input() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        ctxzip(&dir)
            .args(["--storage", storage.as_str(), "compact"])
            .write_stdin("{\"role\": \"user\"}")
            .assert()
            .failure()
            .stderr(predicate::str::contains("JSON array of messages"));
    }

    #[test]
    fn test_compact_rejects_unsupported_storage() {
        let dir = TempDir::new().unwrap();
        ctxzip(&dir)
            .args(["--storage", "s3://bucket/prefix", "compact"])
            .write_stdin(conversation().to_string())
            .assert()
            .failure()
            .stderr(predicate::str::contains("s3"));
    }
}

// =============================================================================
// Reader Tool Tests
// =============================================================================

mod readers {
    use super::*;

    fn compacted_key(dir: &TempDir, storage: &str) -> String {
        let compacted = compact(dir, storage, &conversation());
        let reference = reference_of(&compacted);
        extract_reference_keys(&reference)[0].to_string()
    }

    #[test]
    fn test_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        let key = compacted_key(&dir, &storage);

        ctxzip(&dir)
            .args(["--storage", storage.as_str(), "read", key.as_str()])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("0001 INFO request ok"))
            .stdout(predicate::str::contains("0200 ERROR upstream timeout"));
    }

    #[test]
    fn test_read_line_range() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        let key = compacted_key(&dir, &storage);

        ctxzip(&dir)
            .args(["--storage", storage.as_str(), "read", key.as_str()])
            .args(["--start-line", "50", "--max-lines", "1"])
            .assert()
            .success()
            .stdout("0050 ERROR upstream timeout\n");
    }

    #[test]
    fn test_grep_round_trip() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        let key = compacted_key(&dir, &storage);

        ctxzip(&dir)
            .args(["--storage", storage.as_str(), "grep", key.as_str(), "error", "--flags", "i"])
            .assert()
            .success()
            .stdout(predicate::str::contains("50: 0050 ERROR upstream timeout"))
            .stdout(predicate::str::contains("200: 0200 ERROR upstream timeout"))
            .stdout(predicate::str::contains("INFO").not());
    }

    #[test]
    fn test_grep_json_output() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        let key = compacted_key(&dir, &storage);

        let output = ctxzip(&dir)
            .args(["--storage", storage.as_str(), "grep", key.as_str(), "ERROR", "--json"])
            .args(["--max-results", "2", "-C", "1"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let result: Value = serde_json::from_slice(&output).unwrap();
        let matches = result["matches"].as_array().unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0]["line_number"], 50);
        assert_eq!(matches[0]["context"]["before"][0]["line_number"], 49);
        assert_eq!(matches[0]["context"]["after"][0]["line_number"], 51);
        assert_eq!(result["key"], key.as_str());
    }

    #[test]
    fn test_grep_invalid_pattern_fails() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        let key = compacted_key(&dir, &storage);

        ctxzip(&dir)
            .args(["--storage", storage.as_str(), "grep", key.as_str(), "(unclosed"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid regex"));
    }

    #[test]
    fn test_read_missing_key_fails() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);

        ctxzip(&dir)
            .args(["--storage", storage.as_str(), "read", "nope.txt"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Key not found: nope.txt"));
    }

    #[test]
    fn test_read_without_storage_fails() {
        let dir = TempDir::new().unwrap();
        ctxzip(&dir)
            .args(["read", "anything.txt"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No storage configured"));
    }

    #[test]
    fn test_storage_from_env() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        let key = compacted_key(&dir, &storage);

        ctxzip(&dir)
            .env("CTXZIP_STORAGE", &storage)
            .args(["read", key.as_str(), "--max-lines", "1"])
            .assert()
            .success()
            .stdout("0001 INFO request ok\n");
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = TempDir::new().unwrap();
        ctxzip(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No ctxzip.toml found"))
            .stdout(predicate::str::contains("since-last-assistant-or-user-text"));
    }

    #[test]
    fn test_config_init_creates_file() {
        let dir = TempDir::new().unwrap();
        ctxzip(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created ctxzip.toml"));
        assert!(dir.path().join("ctxzip.toml").exists());

        ctxzip(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        ctxzip(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("ctxzip.toml"),
            "[compaction]\nkey_strategy = \"sequential\"\n",
        )
        .unwrap();

        ctxzip(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration warnings:"))
            .stdout(predicate::str::contains("sequential"));
    }

    #[test]
    fn test_config_file_storage_is_used() {
        let dir = TempDir::new().unwrap();
        let storage = storage_uri(&dir);
        fs::write(
            dir.path().join("ctxzip.toml"),
            format!("[compaction]\nstorage = \"{}\"\n", storage),
        )
        .unwrap();

        let output = ctxzip(&dir)
            .arg("compact")
            .write_stdin(conversation().to_string())
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let compacted: Value = serde_json::from_slice(&output).unwrap();
        let reference = reference_of(&compacted);
        let key = extract_reference_keys(&reference)[0].to_string();
        assert!(dir.path().join("store").join(&key).exists());

        ctxzip(&dir)
            .args(["read", key.as_str(), "--max-lines", "1"])
            .assert()
            .success()
            .stdout("0001 INFO request ok\n");
    }
}

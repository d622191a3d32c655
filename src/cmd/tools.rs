//! Reader tools from the command line: `ctxzip read`, `ctxzip grep`, `ctxzip tools`.

use anyhow::Result;
use ctxzip::search::{GrepFlags, GrepOptions};
use ctxzip::storage::{MemoryStorageAdapter, StorageSpec};
use ctxzip::tools::{GrepAndSearchFileTool, ReadFileTool, ReadOptions};
use std::sync::Arc;

use super::super::Cli;
use super::{load_config, reader_storage};

pub async fn cmd_read(
    cli: &Cli,
    key: &str,
    start_line: Option<usize>,
    max_lines: Option<usize>,
) -> Result<()> {
    let config = load_config(cli)?;
    let tool = ReadFileTool::from_storage(&reader_storage(&config)?)?;

    let options = ReadOptions {
        start_line,
        max_lines,
        ..ReadOptions::default()
    };
    let content = tool.read(key, &options).await?;
    print!("{}", content);
    if !content.is_empty() && !content.ends_with('\n') {
        println!();
    }
    Ok(())
}

/// Arguments of `ctxzip grep`.
pub struct GrepRequest<'a> {
    pub key: &'a str,
    pub pattern: &'a str,
    pub flags: &'a str,
    pub max_results: Option<usize>,
    pub context_lines: Option<usize>,
    pub json: bool,
}

pub async fn cmd_grep(cli: &Cli, request: GrepRequest<'_>) -> Result<()> {
    let config = load_config(cli)?;
    let defaults = config.grep_options();
    let tool = GrepAndSearchFileTool::from_storage(&reader_storage(&config)?)?;

    let options = GrepOptions {
        max_results: request.max_results.unwrap_or(defaults.max_results),
        context_lines: request.context_lines.unwrap_or(defaults.context_lines),
    };
    let flags = GrepFlags::parse(request.flags);
    let matches = tool
        .grep(request.key, request.pattern, flags, &options)
        .await?;

    if request.json {
        let output = serde_json::json!({
            "key": request.key,
            "pattern": request.pattern,
            "flags": flags.to_string(),
            "matches": matches,
            "storage": tool.storage(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    for m in &matches {
        if let Some(context) = &m.context {
            for line in &context.before {
                println!("{}- {}", line.line_number, line.content);
            }
            println!("{}", m);
            for line in &context.after {
                println!("{}- {}", line.line_number, line.content);
            }
            println!("--");
        } else {
            println!("{}", m);
        }
    }
    if matches.is_empty() {
        tracing::info!(key = request.key, "no matches");
    }
    Ok(())
}

pub fn cmd_tools(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let storage = match config.storage() {
        Some(uri) => StorageSpec::Uri(uri),
        // Definitions do not depend on the backend.
        None => StorageSpec::Adapter(Arc::new(MemoryStorageAdapter::default())),
    };
    let definitions = vec![
        ReadFileTool::from_storage(&storage)?.definition(),
        GrepAndSearchFileTool::from_storage(&storage)?
            .with_defaults(config.grep_options())
            .definition(),
    ];
    println!("{}", serde_json::to_string_pretty(&definitions)?);
    Ok(())
}

//! Conversation compaction: `ctxzip compact`.

use anyhow::{Context, Result};
use ctxzip::compaction::{Boundary, Compactor, extract_reference_keys, format_reference};
use ctxzip::message::{ContentBlock, Message};
use ctxzip::storage::{ByteRange, StorageReadParams};
use std::io::{Read, Write};
use std::path::Path;

use super::super::Cli;
use super::load_config;

pub async fn cmd_compact(
    cli: &Cli,
    input: Option<&Path>,
    output: Option<&Path>,
    boundary: Option<&str>,
    report: bool,
) -> Result<()> {
    let config = load_config(cli)?;
    let mut options = config.compact_options()?;
    if let Some(boundary) = boundary {
        options.boundary = boundary.parse::<Boundary>()?;
    }

    let raw = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read messages from stdin")?;
            buf
        }
    };
    let messages: Vec<Message> =
        serde_json::from_str(&raw).context("Input must be a JSON array of messages")?;

    let compactor = Compactor::from_options(options)?;
    adopt_stored_references(&compactor, &messages).await;
    let (compacted, summary) = compactor.compact_with_report(&messages).await?;
    tracing::info!("{}", summary.summary_line());

    let rendered = serde_json::to_string_pretty(&compacted)?;
    match output {
        Some(path) => std::fs::write(path, format!("{}\n", rendered))
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", rendered)?;
        }
    }

    if report {
        eprintln!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(())
}

/// Each run starts with no known keys. Trust references to this storage
/// whose keys are still readable there, so re-running on compacted output
/// leaves it unchanged.
async fn adopt_stored_references(compactor: &Compactor, messages: &[Message]) {
    let identity = compactor.adapter().identify();
    let results = messages
        .iter()
        .flat_map(Message::blocks)
        .filter_map(ContentBlock::as_tool_result);

    for result in results {
        let rendered = result.output.rendered();
        for key in extract_reference_keys(&rendered) {
            if format_reference(&identity, key) != rendered {
                continue;
            }
            let head = StorageReadParams::new(key).with_range(ByteRange::new(0, Some(0)));
            if compactor.adapter().read_text(head).await.is_ok() {
                tracing::debug!(key, "adopting stored reference");
                compactor.known_keys().register(&identity, key);
            }
        }
    }
}

//! CLI command implementations.
//!
//! | Module    | Commands handled          |
//! |-----------|---------------------------|
//! | `compact` | `Compact`                 |
//! | `tools`   | `Read`, `Grep`, `Tools`   |
//! | `config`  | `Config`                  |

pub mod compact;
pub mod config;
pub mod tools;

pub use compact::cmd_compact;
pub use config::cmd_config;
pub use tools::{GrepRequest, cmd_grep, cmd_read, cmd_tools};

use anyhow::{Context, Result};
use ctxzip::config::CtxZipConfig;
use ctxzip::storage::StorageSpec;

use super::Cli;

/// Load the layered configuration for this invocation.
fn load_config(cli: &Cli) -> Result<CtxZipConfig> {
    CtxZipConfig::new(cli.config.clone(), cli.storage.clone()).context("Failed to load configuration")
}

/// Storage for the reader commands. Unlike compaction there is no temporary
/// default: the content must already be somewhere.
fn reader_storage(config: &CtxZipConfig) -> Result<StorageSpec> {
    match config.storage() {
        Some(uri) => Ok(StorageSpec::Uri(uri)),
        None => anyhow::bail!(
            "No storage configured. Pass --storage, set CTXZIP_STORAGE, or set compaction.storage in {}",
            config.path.display()
        ),
    }
}

//! Configuration view and validation commands: `ctxzip config`.

use anyhow::Result;
use ctxzip::config::CtxZipToml;

use super::super::{Cli, ConfigCommands};
use super::load_config;

fn print_toml(toml: &CtxZipToml) -> Result<()> {
    let rendered = toml::to_string_pretty(toml)?;
    for line in rendered.lines() {
        println!("  {}", line);
    }
    Ok(())
}

pub fn cmd_config(cli: &Cli, command: Option<ConfigCommands>) -> Result<()> {
    let config = load_config(cli)?;
    let config_path = config.path.clone();

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("ctxzip Configuration");
            println!("====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No ctxzip.toml found at {}", config_path.display());
                println!("Using default configuration.");
            }
            println!();
            print_toml(&config.toml)?;
            println!();

            println!("Effective values (with env/CLI overrides):");
            match config.storage() {
                Some(storage) => println!("  storage = \"{}\"", storage),
                None => println!("  storage = (temporary directory per run)"),
            }
            let options = config.compact_options()?;
            println!("  boundary = \"{}\"", options.boundary);
            println!("  key_strategy = \"{}\"", options.key_strategy);
            println!("  failure_policy = \"{}\"", options.failure_policy);
            let readers: Vec<&str> = options
                .storage_reader_tool_names
                .iter()
                .map(String::as_str)
                .collect();
            println!("  storage_reader_tool_names = {:?}", readers);
            println!();

            if !config_path.exists() {
                println!("Run 'ctxzip config init' to create a ctxzip.toml file.");
                println!();
            }
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            if !config_path.exists() {
                println!("No ctxzip.toml found. Using defaults (valid).");
                return Ok(());
            }

            let warnings = config.validate();
            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in &warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("ctxzip.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if let Some(parent) = config_path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                std::fs::create_dir_all(parent)?;
            }

            CtxZipToml::default().save(&config_path)?;

            println!("Created ctxzip.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [compaction] storage, boundary, key_strategy, failure_policy");
            println!("  - [search] max_results, context_lines");
            println!();
        }
    }

    Ok(())
}

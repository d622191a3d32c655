use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cmd;

#[derive(Parser)]
#[command(name = "ctxzip")]
#[command(
    version,
    about = "Compact LLM conversations by moving large tool results to storage"
)]
pub struct Cli {
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the config file (defaults to ./ctxzip.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Storage URI (file:///path or memory://name). Overrides ctxzip.toml.
    #[arg(long, global = true)]
    pub storage: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compact a JSON array of messages
    Compact {
        /// Input file (defaults to stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Window boundary: since-last-assistant-or-user-text, entire-conversation,
        /// or first-n-messages:<N>
        #[arg(short, long)]
        boundary: Option<String>,

        /// Print the compaction report to stderr as JSON
        #[arg(long)]
        report: bool,
    },
    /// Print content stored under a key
    Read {
        key: String,

        /// First line to print (1-based)
        #[arg(long)]
        start_line: Option<usize>,

        /// Maximum number of lines to print
        #[arg(long)]
        max_lines: Option<usize>,
    },
    /// Search content stored under a key
    Grep {
        key: String,

        pattern: String,

        /// Regex flags: i, m, s
        #[arg(short, long, default_value = "")]
        flags: String,

        /// Maximum matches to return
        #[arg(long)]
        max_results: Option<usize>,

        /// Lines of context around each match
        #[arg(short = 'C', long)]
        context: Option<usize>,

        /// Print the tool output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the reader tool definitions as JSON
    Tools,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate ctxzip.toml
    Validate,
    /// Write a default ctxzip.toml
    Init,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "ctxzip=debug" } else { "ctxzip=warn" };
    let filter = EnvFilter::try_from_env("CTXZIP_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Compact {
            input,
            output,
            boundary,
            report,
        } => {
            cmd::cmd_compact(
                &cli,
                input.as_deref(),
                output.as_deref(),
                boundary.as_deref(),
                *report,
            )
            .await?
        }
        Commands::Read {
            key,
            start_line,
            max_lines,
        } => cmd::cmd_read(&cli, key, *start_line, *max_lines).await?,
        Commands::Grep {
            key,
            pattern,
            flags,
            max_results,
            context,
            json,
        } => {
            let request = cmd::GrepRequest {
                key,
                pattern,
                flags,
                max_results: *max_results,
                context_lines: *context,
                json: *json,
            };
            cmd::cmd_grep(&cli, request).await?
        }
        Commands::Tools => cmd::cmd_tools(&cli)?,
        Commands::Config { command } => cmd::cmd_config(&cli, command.clone())?,
    }

    Ok(())
}

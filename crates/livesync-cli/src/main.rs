//! livesync CLI
//!
//! Command-line interface for livesync - watch live game data.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::{Output, OutputFormat};

#[derive(Parser)]
#[command(name = "livesync")]
#[command(about = "livesync - Live game data from a snapshot plus stream")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Quiet mode - minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Log more detail to stderr (repeat for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch live games until interrupted (default)
    Watch {
        /// Start over instead of exiting when reconnection gives up
        #[arg(long)]
        keep_trying: bool,
    },
    /// Fetch and print the current games once
    Snapshot,
    /// Show or set configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (snapshot_url, stream_url, retry_interval_ms, ...)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let format = OutputFormat::from_flags(cli.json, cli.quiet);
    let config_path = cli.config.as_deref();

    // Config commands work on the file as-is
    if let Some(Commands::Config { command }) = &cli.command {
        let output = Output::new(format, livesync_core::models::DEFAULT_KEY_FIELD);
        return match command.clone() {
            Some(ConfigCommands::Show) | None => commands::config::show(config_path, &output),
            Some(ConfigCommands::Set { key, value }) => {
                commands::config::set(&key, &value, config_path, &output)
            }
        };
    }

    let config = commands::config::load(config_path)?;
    let output = Output::new(format, config.key_field.clone());

    match cli.command {
        Some(Commands::Snapshot) => commands::snapshot::show(&config, &output).await,
        Some(Commands::Watch { keep_trying }) => {
            commands::watch::watch(&config, keep_trying, &output).await
        }
        None => commands::watch::watch(&config, false, &output).await,
        Some(Commands::Config { .. }) => unreachable!(), // Handled above
    }
}

/// Log to stderr so stdout stays clean for data
///
/// RUST_LOG takes precedence over the verbosity flags.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("livesync_core={level},livesync_cli={level}"))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

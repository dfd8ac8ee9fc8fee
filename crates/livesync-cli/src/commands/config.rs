//! Config command handlers

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use livesync_core::Config;

use crate::output::{Output, OutputFormat};

/// Load configuration from the CLI-specified path or the default location
pub fn load(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")
}

fn effective_path(config_path: Option<&Path>) -> PathBuf {
    config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Config::config_file_path)
}

/// Show current configuration
pub fn show(config_path: Option<&Path>, output: &Output) -> Result<()> {
    let config = load(config_path)?;

    match output.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        OutputFormat::Quiet => {
            println!("{}", config.stream_url);
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  snapshot_url:          {}", config.snapshot_url);
            println!("  stream_url:            {}", config.stream_url);
            println!("  retry_interval_ms:     {}", config.retry_interval_ms);
            println!("  max_retry_interval_ms: {}", config.max_retry_interval_ms);
            println!("  max_attempts:          {}", config.max_attempts);
            println!("  backoff:               {}", config.backoff);
            println!("  envelope_field:        {}", config.envelope_field);
            println!("  key_field:             {}", config.key_field);
            println!("  request_timeout_secs:  {}", config.request_timeout_secs);
            println!();
            println!("Config file: {}", effective_path(config_path).display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: &str, value: &str, config_path: Option<&Path>, output: &Output) -> Result<()> {
    let mut config = load(config_path)?;
    config.set(key, value)?;

    config
        .save_to_path(&effective_path(config_path))
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

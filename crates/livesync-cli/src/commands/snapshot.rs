//! Snapshot command handler

use anyhow::{Context, Result};
use tracing::debug;

use livesync_core::sync::{decode_snapshot, HttpSnapshotSource, SnapshotSource};
use livesync_core::{Config, Dataset};

use crate::output::Output;

/// Fetch the current dataset once and print it
pub async fn show(config: &Config, output: &Output) -> Result<()> {
    let dataset = fetch(config).await?;
    debug!("Snapshot has {} records", dataset.len());
    output.print_dataset(&dataset);
    Ok(())
}

async fn fetch(config: &Config) -> Result<Dataset> {
    let source = HttpSnapshotSource::new(&config.snapshot_url, config.request_timeout())?;
    let body = source
        .fetch()
        .await
        .with_context(|| format!("Snapshot request to {} failed", config.snapshot_url))?;
    let dataset = decode_snapshot(body, &config.envelope_field)?;
    Ok(dataset)
}

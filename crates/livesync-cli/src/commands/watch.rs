//! Watch command handler
//!
//! Streams the live dataset to stdout until interrupted.

use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{info, warn};

use livesync_core::{Config, ConnectionStatus, LiveSyncClient, SyncView};

use crate::output::Output;

/// What changed between two published views
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    None,
    Status,
    Dataset,
}

fn classify(previous: &SyncView, current: &SyncView) -> Change {
    if !Arc::ptr_eq(&previous.dataset, &current.dataset) {
        Change::Dataset
    } else if previous.status != current.status
        || previous.last_error != current.last_error
        || previous.retry_attempts != current.retry_attempts
        || previous.exhausted != current.exhausted
    {
        Change::Status
    } else {
        Change::None
    }
}

/// Whether the client stopped reconnecting on its own with this view
fn gave_up(previous: &SyncView, current: &SyncView) -> bool {
    current.exhausted && !previous.exhausted
}

/// Watch the live dataset
///
/// With `keep_trying`, a client that gave up is told to start over instead
/// of ending the command.
pub async fn watch(config: &Config, keep_trying: bool, output: &Output) -> Result<()> {
    let client = LiveSyncClient::from_config(config)?;
    info!(
        "Watching {} (session {})",
        config.stream_url,
        client.session_id()
    );

    let mut views = client.subscribe();
    let mut previous = views.borrow_and_update().clone();
    output.print_view(&previous);

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                output.message("Interrupted");
                break;
            }
        }

        let current = views.borrow_and_update().clone();
        match classify(&previous, &current) {
            Change::Dataset => output.print_view(&current),
            Change::Status => output.print_status(&current),
            Change::None => {}
        }

        if gave_up(&previous, &current) {
            if keep_trying {
                warn!("Gave up after {} attempts, starting over", current.retry_attempts);
                client.reconnect();
            } else {
                client.shutdown().await;
                bail!(
                    "{}",
                    current
                        .last_error
                        .unwrap_or_else(|| "Stream connection lost".to_string())
                );
            }
        }
        previous = current;
    }

    client.shutdown().await;
    Ok(())
}

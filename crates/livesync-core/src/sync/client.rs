//! Live sync client
//!
//! The consumer-facing handle. Creating a client starts the snapshot load
//! and the stream; everything after that is observed through the published
//! [`SyncView`]. None of the methods block or fail once the client exists.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use super::persistent::{spawn_sync_task, SyncCommand};
use super::snapshot::{HttpSnapshotSource, SnapshotSource};
use super::state::{ConnectionStatus, SyncMachine, SyncView};
use super::transport::{StreamConnector, WebSocketConnector};
use crate::config::Config;
use crate::error::SyncResult;
use crate::models::{Dataset, Record};

/// Keeps a local copy of the live dataset in sync with the server
pub struct LiveSyncClient {
    /// Short id used to tell sessions apart in logs
    session_id: String,
    /// Identifier field used by `find`
    key_field: String,
    command_tx: mpsc::UnboundedSender<SyncCommand>,
    view_rx: watch::Receiver<SyncView>,
    task: Option<JoinHandle<()>>,
}

impl LiveSyncClient {
    /// Start a client against the configured HTTP snapshot and WebSocket
    /// stream endpoints
    ///
    /// Must be called from within a tokio runtime.
    pub fn from_config(config: &Config) -> SyncResult<Self> {
        let connector = WebSocketConnector::new(&config.stream_url);
        let snapshots = HttpSnapshotSource::new(&config.snapshot_url, config.request_timeout())?;
        Ok(Self::with_transport(config, connector, snapshots))
    }

    /// Start a client with custom transports
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_transport<C, S>(config: &Config, connector: C, snapshots: S) -> Self
    where
        C: StreamConnector,
        S: SnapshotSource,
    {
        let session_id = format!("livesync-{}", &uuid::Uuid::new_v4().to_string()[..8]);
        let machine = SyncMachine::new(config.retry_config(), config.envelope_field.clone());

        let handle = spawn_sync_task(
            machine,
            Arc::new(connector),
            Arc::new(snapshots),
            &session_id,
        );
        debug!("Started sync session {}", session_id);

        Self {
            session_id,
            key_field: config.key_field.clone(),
            command_tx: handle.command_tx,
            view_rx: handle.view_rx,
            task: Some(handle.task),
        }
    }

    /// Get our session ID
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current dataset, status and error, as one consistent value
    pub fn view(&self) -> SyncView {
        self.view_rx.borrow().clone()
    }

    /// Current dataset
    pub fn dataset(&self) -> Arc<Dataset> {
        Arc::clone(&self.view_rx.borrow().dataset)
    }

    /// Current connection status
    pub fn status(&self) -> ConnectionStatus {
        self.view_rx.borrow().status
    }

    /// Most recent failure, if any
    pub fn last_error(&self) -> Option<String> {
        self.view_rx.borrow().last_error.clone()
    }

    /// Look up a record by its identifier
    pub fn find(&self, id: &str) -> Option<Record> {
        self.view_rx
            .borrow()
            .dataset
            .find_by(&self.key_field, id)
            .cloned()
    }

    /// Subscribe to view changes
    pub fn subscribe(&self) -> watch::Receiver<SyncView> {
        self.view_rx.clone()
    }

    /// Reset the retry counter and reconnect immediately
    ///
    /// Returns at once; the effect shows up in subsequent views.
    pub fn reconnect(&self) {
        self.send(SyncCommand::Reconnect);
    }

    /// Reload the snapshot
    pub fn refresh(&self) {
        self.send(SyncCommand::Refresh);
    }

    /// Stop syncing and wait for the connection to be released
    pub async fn shutdown(mut self) {
        self.send(SyncCommand::Shutdown);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn send(&self, command: SyncCommand) {
        if self.command_tx.send(command).is_err() {
            debug!("Sync task already stopped, dropping {:?}", command);
        }
    }
}

impl Drop for LiveSyncClient {
    fn drop(&mut self) {
        let _ = self.command_tx.send(SyncCommand::Shutdown);
    }
}

//! Persistent sync task
//!
//! Runs the state machine on a single background task. Connection events,
//! snapshot results, the retry timer and consumer commands are all funnelled
//! into this task and applied one at a time; after each one the whole view
//! is republished on a watch channel.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, Instrument};

use super::snapshot::SnapshotSource;
use super::state::{AttemptId, Effect, SnapshotTicket, SyncInput, SyncMachine, SyncView};
use super::transport::{FrameStream, StreamConnector};
use crate::error::SyncResult;

/// Commands sent to the sync task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Reset the retry counter and reconnect immediately
    Reconnect,
    /// Reload the snapshot
    Refresh,
    /// Shutdown the sync task
    Shutdown,
}

/// Handle to control the persistent sync task
pub struct PersistentSyncHandle {
    /// Send commands to the sync task
    pub command_tx: mpsc::UnboundedSender<SyncCommand>,
    /// Watch the published view
    pub view_rx: watch::Receiver<SyncView>,
    /// The task itself
    pub task: JoinHandle<()>,
}

/// Spawn a persistent sync task
///
/// Must be called from within a tokio runtime. The task loads the snapshot,
/// opens the stream, and runs until it receives `Shutdown` or every command
/// sender is dropped.
pub fn spawn_sync_task(
    machine: SyncMachine,
    connector: Arc<dyn StreamConnector>,
    snapshots: Arc<dyn SnapshotSource>,
    session_id: &str,
) -> PersistentSyncHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (view_tx, view_rx) = watch::channel(machine.view().clone());

    let task = SyncTask {
        machine,
        connector,
        snapshots,
        view_tx,
        event_tx,
        connection: None,
        retry_at: None,
    };

    let span = tracing::info_span!("livesync", session = %session_id);
    let task = tokio::spawn(task.run(command_rx, event_rx).instrument(span));

    PersistentSyncHandle {
        command_tx,
        view_rx,
        task,
    }
}

/// The live connection and the attempt it belongs to
struct Connection {
    attempt: AttemptId,
    task: JoinHandle<()>,
}

struct SyncTask {
    machine: SyncMachine,
    connector: Arc<dyn StreamConnector>,
    snapshots: Arc<dyn SnapshotSource>,
    view_tx: watch::Sender<SyncView>,
    /// Connection and snapshot tasks report back through here
    event_tx: mpsc::UnboundedSender<SyncInput>,
    connection: Option<Connection>,
    retry_at: Option<Instant>,
}

impl SyncTask {
    /// Main loop
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<SyncCommand>,
        mut event_rx: mpsc::UnboundedReceiver<SyncInput>,
    ) {
        info!("Sync task started");
        let effects = self.machine.start();
        self.apply(effects);
        self.publish();

        loop {
            let retry_deadline = self.retry_at.unwrap_or_else(Instant::now);

            let input = tokio::select! {
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SyncCommand::Reconnect) => SyncInput::Reconnect,
                        Some(SyncCommand::Refresh) => SyncInput::Refresh,
                        Some(SyncCommand::Shutdown) | None => break,
                    }
                }
                Some(input) = event_rx.recv() => input,
                _ = tokio::time::sleep_until(retry_deadline), if self.retry_at.is_some() => {
                    self.retry_at = None;
                    SyncInput::RetryDue
                }
            };

            let effects = self.machine.handle(input);
            self.apply(effects);
            self.publish();
        }

        let effects = self.machine.shutdown();
        self.apply(effects);
        self.publish();
        info!("Sync task stopped");
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Open(attempt) => self.open(attempt),
                Effect::Close(attempt) => self.close(attempt),
                Effect::ScheduleRetry(delay) => {
                    self.retry_at = Some(Instant::now() + delay);
                }
                Effect::CancelRetry => {
                    self.retry_at = None;
                }
                Effect::LoadSnapshot(ticket) => self.load_snapshot(ticket),
            }
        }
    }

    fn open(&mut self, attempt: AttemptId) {
        // Never more than one connection
        if let Some(previous) = self.connection.take() {
            previous.task.abort();
        }

        debug!("Opening stream (attempt {})", attempt);
        let connect = self.connector.connect();
        let task = tokio::spawn(pump_connection(attempt, connect, self.event_tx.clone()));
        self.connection = Some(Connection { attempt, task });
    }

    fn close(&mut self, attempt: AttemptId) {
        match self.connection.take() {
            Some(conn) if conn.attempt == attempt => {
                debug!("Closing stream (attempt {})", attempt);
                conn.task.abort();
            }
            other => self.connection = other,
        }
    }

    fn load_snapshot(&self, ticket: SnapshotTicket) {
        let fetch = self.snapshots.fetch();
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = fetch.await;
            // Receiver is gone after shutdown; the result is discarded
            let _ = event_tx.send(SyncInput::SnapshotLoaded(ticket, result));
        });
    }

    fn publish(&self) {
        let view = self.machine.view();
        self.view_tx.send_if_modified(|current| {
            if *current == *view {
                false
            } else {
                *current = view.clone();
                true
            }
        });
    }
}

/// Forward one connection's events, tagged with its attempt
///
/// Aborting this task drops the frame stream, which closes the connection.
async fn pump_connection(
    attempt: AttemptId,
    connect: BoxFuture<'static, SyncResult<FrameStream>>,
    event_tx: mpsc::UnboundedSender<SyncInput>,
) {
    let mut frames = match connect.await {
        Ok(frames) => frames,
        Err(e) => {
            let _ = event_tx.send(SyncInput::TransportError(attempt, e));
            let _ = event_tx.send(SyncInput::Closed(attempt));
            return;
        }
    };

    if event_tx.send(SyncInput::Opened(attempt)).is_err() {
        return;
    }

    while let Some(frame) = frames.next().await {
        let input = match frame {
            Ok(payload) => SyncInput::Message(attempt, payload),
            Err(e) if e.is_decode() => SyncInput::MessageError(attempt, e),
            Err(e) => {
                let _ = event_tx.send(SyncInput::TransportError(attempt, e));
                break;
            }
        };
        if event_tx.send(input).is_err() {
            return;
        }
    }

    let _ = event_tx.send(SyncInput::Closed(attempt));
}

//! Sync state machine
//!
//! Owns the dataset, connection status, last error and retry counter, and
//! turns every input (connection event, timer, snapshot result, consumer
//! command) into a list of effects for the driver to carry out. It performs
//! no I/O itself, so every transition can be exercised directly.
//!
//! Each connection attempt carries an [`AttemptId`]. Only events tagged with
//! the current attempt are applied; anything from a superseded connection
//! is dropped.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::message::{decode_snapshot, decode_stream_payload};
use super::policy::{ReconnectPolicy, RetryConfig, RetryDecision};
use crate::error::{SyncError, SyncResult};
use crate::models::Dataset;

/// Connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    /// Attempting to connect
    Connecting,
    /// Connected and receiving updates
    Connected,
    /// Not connected (waiting to retry, gave up, or shut down)
    Disconnected,
    /// The transport reported an error; a close follows
    Failed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Identity of one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifies a snapshot request and the stream data it started from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotTicket {
    /// Stream datasets received when the request began
    stream_revision: u64,
    /// Request number, increasing
    request: u64,
}

/// Everything a consumer can observe, published as one value
#[derive(Debug, Clone, PartialEq)]
pub struct SyncView {
    /// Current dataset
    pub dataset: Arc<Dataset>,
    /// Current connection status
    pub status: ConnectionStatus,
    /// Most recent failure, if any
    pub last_error: Option<String>,
    /// Consecutive failed attempts since the last successful open
    pub retry_attempts: u32,
    /// When the dataset was last replaced
    pub updated_at: Option<DateTime<Utc>>,
    /// Reconnection gave up; only `reconnect()` starts a new attempt
    pub exhausted: bool,
}

impl Default for SyncView {
    fn default() -> Self {
        Self {
            dataset: Arc::new(Dataset::default()),
            status: ConnectionStatus::Connecting,
            last_error: None,
            retry_attempts: 0,
            updated_at: None,
            exhausted: false,
        }
    }
}

/// Inputs to the state machine
#[derive(Debug, Clone)]
pub enum SyncInput {
    /// The transport for this attempt is established
    Opened(AttemptId),
    /// A complete payload arrived
    Message(AttemptId, String),
    /// A frame arrived that could not be read as text
    MessageError(AttemptId, SyncError),
    /// The transport reported an error
    TransportError(AttemptId, SyncError),
    /// The connection ended
    Closed(AttemptId),
    /// The scheduled retry delay elapsed
    RetryDue,
    /// A snapshot request finished
    SnapshotLoaded(SnapshotTicket, SyncResult<Value>),
    /// Consumer asked for a fresh snapshot
    Refresh,
    /// Consumer asked to reconnect now
    Reconnect,
}

/// Work the driver must carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a new connection for this attempt
    Open(AttemptId),
    /// Tear down the connection of this attempt
    Close(AttemptId),
    /// Fire `SyncInput::RetryDue` after the delay
    ScheduleRetry(Duration),
    /// Drop any pending retry timer
    CancelRetry,
    /// Request a snapshot and report it with this ticket
    LoadSnapshot(SnapshotTicket),
}

/// Stream lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Not started
    Idle,
    /// Connection requested
    Opening(AttemptId),
    /// Connection established
    Open(AttemptId),
    /// Closed, retry scheduled
    Waiting,
    /// Closed, retry ceiling reached
    Exhausted,
    /// Shut down; every input is ignored
    Stopped,
}

/// The client's single owner of state
#[derive(Debug)]
pub struct SyncMachine {
    view: SyncView,
    phase: Phase,
    policy: ReconnectPolicy,
    last_attempt: u64,
    stream_revision: u64,
    last_request: u64,
    applied_request: u64,
    envelope_field: String,
}

impl SyncMachine {
    pub fn new(retry: RetryConfig, envelope_field: impl Into<String>) -> Self {
        Self {
            view: SyncView::default(),
            phase: Phase::Idle,
            policy: ReconnectPolicy::new(retry),
            last_attempt: 0,
            stream_revision: 0,
            last_request: 0,
            applied_request: 0,
            envelope_field: envelope_field.into(),
        }
    }

    /// Current consumer-facing view
    pub fn view(&self) -> &SyncView {
        &self.view
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Attempt whose events are currently accepted
    pub fn current_attempt(&self) -> Option<AttemptId> {
        match self.phase {
            Phase::Opening(id) | Phase::Open(id) => Some(id),
            _ => None,
        }
    }

    /// Load the snapshot and open the first connection
    pub fn start(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Idle {
            return Vec::new();
        }

        let mut effects = vec![Effect::LoadSnapshot(self.next_ticket())];
        self.begin_attempt(&mut effects);
        effects
    }

    /// Apply one input
    pub fn handle(&mut self, input: SyncInput) -> Vec<Effect> {
        let mut effects = Vec::new();

        if self.phase == Phase::Stopped {
            debug!("Ignoring {:?} after shutdown", input);
            return effects;
        }

        match input {
            SyncInput::Opened(id) => {
                if self.phase != Phase::Opening(id) {
                    debug!("Ignoring open from superseded attempt {}", id);
                    return effects;
                }
                info!("Stream connected (attempt {})", id);
                self.phase = Phase::Open(id);
                self.policy.record_success();
                self.view.status = ConnectionStatus::Connected;
                self.view.last_error = None;
                self.view.retry_attempts = 0;
            }
            SyncInput::Message(id, payload) => {
                if !self.is_current(id) {
                    debug!("Ignoring message from superseded attempt {}", id);
                    return effects;
                }
                match decode_stream_payload(&payload) {
                    Ok(dataset) => {
                        debug!("Received dataset with {} records", dataset.len());
                        self.stream_revision += 1;
                        self.replace_dataset(dataset);
                    }
                    Err(e) => {
                        warn!("Failed to decode stream message: {}", e);
                        self.view.last_error = Some(e.to_string());
                    }
                }
            }
            SyncInput::MessageError(id, error) => {
                if !self.is_current(id) {
                    return effects;
                }
                warn!("Unreadable stream message: {}", error);
                self.view.last_error = Some(error.to_string());
            }
            SyncInput::TransportError(id, error) => {
                if !self.is_current(id) {
                    debug!("Ignoring error from superseded attempt {}", id);
                    return effects;
                }
                warn!("Stream error (attempt {}): {}", id, error);
                self.view.status = ConnectionStatus::Failed;
                self.view.last_error = Some(error.to_string());
            }
            SyncInput::Closed(id) => {
                if !self.is_current(id) {
                    debug!("Ignoring close from superseded attempt {}", id);
                    return effects;
                }
                self.on_closed(id, &mut effects);
            }
            SyncInput::RetryDue => {
                if self.phase != Phase::Waiting {
                    debug!("Ignoring retry timer in phase {:?}", self.phase);
                    return effects;
                }
                info!(
                    "Reconnecting (attempt {} of {})",
                    self.policy.failures() + 1,
                    self.policy.config().max_attempts
                );
                self.begin_attempt(&mut effects);
            }
            SyncInput::SnapshotLoaded(ticket, result) => {
                self.on_snapshot(ticket, result);
            }
            SyncInput::Refresh => {
                effects.push(Effect::LoadSnapshot(self.next_ticket()));
            }
            SyncInput::Reconnect => {
                info!("Manual reconnect requested");
                self.policy.reset();
                self.view.retry_attempts = 0;
                if self.phase == Phase::Waiting {
                    effects.push(Effect::CancelRetry);
                }
                self.begin_attempt(&mut effects);
            }
        }

        effects
    }

    /// Stop the machine, releasing the connection and any pending retry
    pub fn shutdown(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        match self.phase {
            Phase::Stopped => return effects,
            Phase::Opening(id) | Phase::Open(id) => effects.push(Effect::Close(id)),
            Phase::Waiting => effects.push(Effect::CancelRetry),
            Phase::Idle | Phase::Exhausted => {}
        }
        self.phase = Phase::Stopped;
        self.view.status = ConnectionStatus::Disconnected;
        effects
    }

    fn is_current(&self, id: AttemptId) -> bool {
        self.current_attempt() == Some(id)
    }

    fn next_ticket(&mut self) -> SnapshotTicket {
        self.last_request += 1;
        SnapshotTicket {
            stream_revision: self.stream_revision,
            request: self.last_request,
        }
    }

    fn begin_attempt(&mut self, effects: &mut Vec<Effect>) {
        if let Some(previous) = self.current_attempt() {
            effects.push(Effect::Close(previous));
        }

        self.last_attempt += 1;
        let id = AttemptId(self.last_attempt);
        self.phase = Phase::Opening(id);
        self.view.status = ConnectionStatus::Connecting;
        self.view.last_error = None;
        self.view.exhausted = false;
        effects.push(Effect::Open(id));
    }

    fn on_closed(&mut self, id: AttemptId, effects: &mut Vec<Effect>) {
        self.view.status = ConnectionStatus::Disconnected;

        match self.policy.on_closed() {
            RetryDecision::Retry { attempt, delay } => {
                info!(
                    "Stream closed (attempt {}), retry {} in {:?}",
                    id, attempt, delay
                );
                self.phase = Phase::Waiting;
                effects.push(Effect::ScheduleRetry(delay));
            }
            RetryDecision::Exhausted { attempts } => {
                let error = SyncError::Exhausted { attempts };
                warn!("{}", error);
                self.phase = Phase::Exhausted;
                self.view.last_error = Some(error.to_string());
                self.view.exhausted = true;
            }
        }
        self.view.retry_attempts = self.policy.failures();
    }

    fn on_snapshot(&mut self, ticket: SnapshotTicket, result: SyncResult<Value>) {
        let decoded = result.and_then(|body| decode_snapshot(body, &self.envelope_field));
        match decoded {
            Ok(_) if ticket.stream_revision != self.stream_revision => {
                debug!("Discarding snapshot, stream delivered newer data");
            }
            Ok(_) if ticket.request < self.applied_request => {
                debug!("Discarding snapshot, a later request already loaded");
            }
            Ok(dataset) => {
                info!("Loaded snapshot with {} records", dataset.len());
                self.applied_request = ticket.request;
                self.replace_dataset(dataset);
            }
            Err(e) => {
                warn!("Snapshot failed: {}", e);
                self.view.last_error = Some(e.to_string());
            }
        }
    }

    fn replace_dataset(&mut self, dataset: Dataset) {
        self.view.dataset = Arc::new(dataset);
        self.view.updated_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            retry_interval: Duration::from_millis(5000),
            max_retry_interval: Duration::from_millis(30000),
            max_attempts,
            backoff: Default::default(),
        }
    }

    fn started(max_attempts: u32) -> (SyncMachine, AttemptId, SnapshotTicket) {
        let mut machine = SyncMachine::new(config(max_attempts), "games");
        let effects = machine.start();
        let ticket = match effects[0] {
            Effect::LoadSnapshot(ticket) => ticket,
            ref other => panic!("expected snapshot load, got {:?}", other),
        };
        let id = opened_attempt(&effects);
        (machine, id, ticket)
    }

    fn opened_attempt(effects: &[Effect]) -> AttemptId {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::Open(id) => Some(*id),
                _ => None,
            })
            .expect("expected an open effect")
    }

    fn ids(machine: &SyncMachine, key: &str) -> Vec<String> {
        machine
            .view()
            .dataset
            .iter()
            .filter_map(|r| r.id(key))
            .collect()
    }

    #[test]
    fn test_start_loads_snapshot_and_opens() {
        let mut machine = SyncMachine::new(config(10), "games");
        let effects = machine.start();

        assert_eq!(effects.len(), 2);
        assert!(matches!(effects[0], Effect::LoadSnapshot(_)));
        assert!(matches!(effects[1], Effect::Open(_)));
        assert_eq!(machine.view().status, ConnectionStatus::Connecting);

        // Starting twice is a no-op
        assert!(machine.start().is_empty());
    }

    #[test]
    fn test_open_sets_connected() {
        let (mut machine, id, _) = started(10);
        machine.handle(SyncInput::Opened(id));

        assert_eq!(machine.view().status, ConnectionStatus::Connected);
        assert_eq!(machine.phase(), Phase::Open(id));
        assert!(machine.view().last_error.is_none());
    }

    #[test]
    fn test_stream_replaces_snapshot_wholesale() {
        let (mut machine, id, ticket) = started(10);

        machine.handle(SyncInput::SnapshotLoaded(
            ticket,
            Ok(json!([{"game_id": "g1", "home_score": 1}])),
        ));
        assert_eq!(ids(&machine, "game_id"), vec!["g1"]);

        machine.handle(SyncInput::Opened(id));
        machine.handle(SyncInput::Message(
            id,
            r#"[{"game_id":"g1","home_score":2},{"game_id":"g2"}]"#.to_string(),
        ));

        assert_eq!(ids(&machine, "game_id"), vec!["g1", "g2"]);
        let g1 = machine.view().dataset.find_by("game_id", "g1").unwrap();
        assert_eq!(g1.get("home_score"), Some(&json!(2)));
        assert!(machine.view().updated_at.is_some());
    }

    #[test]
    fn test_snapshot_after_stream_data_is_discarded() {
        let (mut machine, id, ticket) = started(10);
        machine.handle(SyncInput::Opened(id));
        machine.handle(SyncInput::Message(id, r#"[{"game_id":"g2"}]"#.to_string()));

        machine.handle(SyncInput::SnapshotLoaded(
            ticket,
            Ok(json!({"games": [{"game_id": "g1"}]})),
        ));

        assert_eq!(ids(&machine, "game_id"), vec!["g2"]);
    }

    #[test]
    fn test_overlapping_refreshes_keep_latest_request() {
        let (mut machine, _, ticket) = started(10);
        machine.handle(SyncInput::SnapshotLoaded(ticket, Ok(json!([{"game_id": "a"}]))));

        let first = match machine.handle(SyncInput::Refresh)[0] {
            Effect::LoadSnapshot(t) => t,
            ref other => panic!("expected snapshot load, got {:?}", other),
        };
        let second = match machine.handle(SyncInput::Refresh)[0] {
            Effect::LoadSnapshot(t) => t,
            ref other => panic!("expected snapshot load, got {:?}", other),
        };

        // No stream traffic: both apply in arrival order
        machine.handle(SyncInput::SnapshotLoaded(first, Ok(json!([{"game_id": "b"}]))));
        assert_eq!(ids(&machine, "game_id"), vec!["b"]);
        machine.handle(SyncInput::SnapshotLoaded(second, Ok(json!([{"game_id": "c"}]))));
        assert_eq!(ids(&machine, "game_id"), vec!["c"]);
    }

    #[test]
    fn test_older_refresh_arriving_last_is_discarded() {
        let (mut machine, _, _) = started(10);
        let first = match machine.handle(SyncInput::Refresh)[0] {
            Effect::LoadSnapshot(t) => t,
            ref other => panic!("expected snapshot load, got {:?}", other),
        };
        let second = match machine.handle(SyncInput::Refresh)[0] {
            Effect::LoadSnapshot(t) => t,
            ref other => panic!("expected snapshot load, got {:?}", other),
        };

        machine.handle(SyncInput::SnapshotLoaded(second, Ok(json!([{"game_id": "new"}]))));
        machine.handle(SyncInput::SnapshotLoaded(first, Ok(json!([{"game_id": "old"}]))));
        assert_eq!(ids(&machine, "game_id"), vec!["new"]);
    }

    #[test]
    fn test_open_then_close_never_exhausts() {
        let (mut machine, mut id, _) = started(10);

        for _ in 0..12 {
            machine.handle(SyncInput::Opened(id));
            let effects = machine.handle(SyncInput::Closed(id));
            assert_eq!(effects, vec![Effect::ScheduleRetry(Duration::from_secs(5))]);
            assert_eq!(machine.view().retry_attempts, 1);
            id = opened_attempt(&machine.handle(SyncInput::RetryDue));
        }
        assert!(!machine.view().exhausted);
    }

    #[test]
    fn test_snapshot_envelope_and_other_shapes() {
        let (mut machine, _, ticket) = started(10);
        machine.handle(SyncInput::SnapshotLoaded(
            ticket,
            Ok(json!({"games": [{"game_id": "g1"}, {"game_id": "g2"}]})),
        ));
        assert_eq!(machine.view().dataset.len(), 2);

        let effects = machine.handle(SyncInput::Refresh);
        let Effect::LoadSnapshot(refresh) = effects[0] else {
            panic!("expected snapshot load");
        };
        machine.handle(SyncInput::SnapshotLoaded(refresh, Ok(json!({"status": "ok"}))));
        assert!(machine.view().dataset.is_empty());
    }

    #[test]
    fn test_snapshot_failure_keeps_dataset_and_status() {
        let (mut machine, id, ticket) = started(10);
        machine.handle(SyncInput::Opened(id));
        machine.handle(SyncInput::Message(id, r#"[{"game_id":"g1"}]"#.to_string()));

        let effects = machine.handle(SyncInput::SnapshotLoaded(
            ticket,
            Err(SyncError::Snapshot("HTTP 503".to_string())),
        ));

        assert!(effects.is_empty());
        assert_eq!(ids(&machine, "game_id"), vec!["g1"]);
        assert_eq!(machine.view().status, ConnectionStatus::Connected);
        assert_eq!(
            machine.view().last_error.as_deref(),
            Some("Failed to fetch games: HTTP 503")
        );
        assert_eq!(machine.view().retry_attempts, 0);
    }

    #[test]
    fn test_decode_failure_keeps_status_and_dataset() {
        let (mut machine, id, _) = started(10);
        machine.handle(SyncInput::Opened(id));
        machine.handle(SyncInput::Message(id, r#"[{"game_id":"g1"}]"#.to_string()));

        let effects = machine.handle(SyncInput::Message(id, "not json".to_string()));

        assert!(effects.is_empty());
        assert_eq!(machine.view().status, ConnectionStatus::Connected);
        assert_eq!(ids(&machine, "game_id"), vec!["g1"]);
        assert!(machine
            .view()
            .last_error
            .as_deref()
            .unwrap()
            .contains("Failed to parse game data"));

        // The stream keeps working afterwards
        machine.handle(SyncInput::Message(id, r#"[{"game_id":"g3"}]"#.to_string()));
        assert_eq!(ids(&machine, "game_id"), vec!["g3"]);
    }

    #[test]
    fn test_unreadable_frame_is_recorded_only() {
        let (mut machine, id, _) = started(10);
        machine.handle(SyncInput::Opened(id));

        let effects = machine.handle(SyncInput::MessageError(
            id,
            SyncError::Decode("binary frame is not valid UTF-8".to_string()),
        ));

        assert!(effects.is_empty());
        assert_eq!(machine.view().status, ConnectionStatus::Connected);
        assert!(machine.view().last_error.is_some());
    }

    #[test]
    fn test_transport_error_does_not_reconnect() {
        let (mut machine, id, _) = started(10);
        machine.handle(SyncInput::Opened(id));

        let effects = machine.handle(SyncInput::TransportError(
            id,
            SyncError::Transport("connection reset".to_string()),
        ));

        assert!(effects.is_empty());
        assert_eq!(machine.view().status, ConnectionStatus::Failed);
        assert_eq!(
            machine.view().last_error.as_deref(),
            Some("Stream connection error: connection reset")
        );

        // The close that follows schedules exactly one retry
        let effects = machine.handle(SyncInput::Closed(id));
        assert_eq!(effects, vec![Effect::ScheduleRetry(Duration::from_secs(5))]);
        assert_eq!(machine.view().status, ConnectionStatus::Disconnected);

        // A duplicate close for the same attempt is ignored
        assert!(machine.handle(SyncInput::Closed(id)).is_empty());
    }

    #[test]
    fn test_close_waits_then_reconnects() {
        let (mut machine, id, _) = started(10);
        machine.handle(SyncInput::Opened(id));

        machine.handle(SyncInput::Closed(id));
        assert_eq!(machine.phase(), Phase::Waiting);
        assert_eq!(machine.view().status, ConnectionStatus::Disconnected);
        assert_eq!(machine.view().retry_attempts, 1);

        let effects = machine.handle(SyncInput::RetryDue);
        let next = opened_attempt(&effects);
        assert!(next > id);
        assert_eq!(machine.view().status, ConnectionStatus::Connecting);

        machine.handle(SyncInput::Opened(next));
        assert_eq!(machine.view().status, ConnectionStatus::Connected);
        assert_eq!(machine.view().retry_attempts, 0);
    }

    #[test]
    fn test_exhausts_after_ceiling_failed_attempts() {
        // Attempts that close before ever opening; an open resets the count
        let (mut machine, mut id, _) = started(10);

        for closure in 1..=10 {
            let effects = machine.handle(SyncInput::Closed(id));
            if closure < 10 {
                assert_eq!(effects, vec![Effect::ScheduleRetry(Duration::from_secs(5))]);
                id = opened_attempt(&machine.handle(SyncInput::RetryDue));
            } else {
                assert!(effects.is_empty(), "no 11th attempt may be scheduled");
            }
        }

        assert_eq!(machine.phase(), Phase::Exhausted);
        assert_eq!(machine.view().status, ConnectionStatus::Disconnected);
        assert!(machine.view().exhausted);
        assert!(machine
            .view()
            .last_error
            .as_deref()
            .unwrap()
            .contains("Max reconnection attempts reached"));

        // A stray timer cannot restart it
        assert!(machine.handle(SyncInput::RetryDue).is_empty());
    }

    #[test]
    fn test_manual_reconnect_from_exhausted() {
        let (mut machine, id, _) = started(1);
        machine.handle(SyncInput::Closed(id));
        assert_eq!(machine.phase(), Phase::Exhausted);
        assert_eq!(machine.view().retry_attempts, 1);

        let effects = machine.handle(SyncInput::Reconnect);

        assert_eq!(effects.len(), 1);
        assert!(matches!(effects[0], Effect::Open(_)));
        assert_eq!(machine.view().status, ConnectionStatus::Connecting);
        assert_eq!(machine.view().retry_attempts, 0);
        assert!(machine.view().last_error.is_none());
        assert!(!machine.view().exhausted);
    }

    #[test]
    fn test_manual_reconnect_cancels_pending_retry() {
        let (mut machine, id, _) = started(10);
        machine.handle(SyncInput::Closed(id));
        assert_eq!(machine.phase(), Phase::Waiting);

        let effects = machine.handle(SyncInput::Reconnect);
        assert_eq!(effects[0], Effect::CancelRetry);
        assert!(matches!(effects[1], Effect::Open(_)));
        assert_eq!(machine.view().retry_attempts, 0);

        // The cancelled timer firing late does not open a second connection
        assert!(machine.handle(SyncInput::RetryDue).is_empty());
    }

    #[test]
    fn test_manual_reconnect_supersedes_open_handle() {
        let (mut machine, old, _) = started(10);
        machine.handle(SyncInput::Opened(old));
        machine.handle(SyncInput::Message(old, r#"[{"game_id":"g1"}]"#.to_string()));

        let effects = machine.handle(SyncInput::Reconnect);
        assert_eq!(effects[0], Effect::Close(old));
        let new = opened_attempt(&effects);

        // Late events from the old handle are ignored
        machine.handle(SyncInput::Message(old, r#"[{"game_id":"stale"}]"#.to_string()));
        machine.handle(SyncInput::TransportError(
            old,
            SyncError::Transport("reset".to_string()),
        ));
        assert!(machine.handle(SyncInput::Closed(old)).is_empty());
        assert!(machine.handle(SyncInput::Opened(old)).is_empty());

        assert_eq!(ids(&machine, "game_id"), vec!["g1"]);
        assert_eq!(machine.view().status, ConnectionStatus::Connecting);
        assert_eq!(machine.current_attempt(), Some(new));

        machine.handle(SyncInput::Opened(new));
        machine.handle(SyncInput::Message(new, r#"[{"game_id":"g2"}]"#.to_string()));
        assert_eq!(ids(&machine, "game_id"), vec!["g2"]);
    }

    #[test]
    fn test_connected_only_between_open_and_close() {
        let (mut machine, mut id, _) = started(100);

        // open, close, retry, close, retry, open, error, close
        let script = [
            "open", "close", "retry", "close", "retry", "open", "error", "close", "retry",
            "open",
        ];
        let mut open_not_closed = false;
        for step in script {
            match step {
                "open" => {
                    machine.handle(SyncInput::Opened(id));
                    open_not_closed = true;
                }
                "close" => {
                    machine.handle(SyncInput::Closed(id));
                    open_not_closed = false;
                }
                "error" => {
                    machine.handle(SyncInput::TransportError(
                        id,
                        SyncError::Transport("reset".to_string()),
                    ));
                    open_not_closed = false;
                }
                "retry" => {
                    id = opened_attempt(&machine.handle(SyncInput::RetryDue));
                }
                _ => unreachable!(),
            }
            assert_eq!(
                machine.view().status == ConnectionStatus::Connected,
                open_not_closed,
                "after {}",
                step
            );
        }
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let (mut machine, id, ticket) = started(10);
        machine.handle(SyncInput::Opened(id));

        assert_eq!(machine.shutdown(), vec![Effect::Close(id)]);
        assert_eq!(machine.phase(), Phase::Stopped);

        // Late results are no-ops
        machine.handle(SyncInput::SnapshotLoaded(ticket, Ok(json!([{"game_id": "g1"}]))));
        machine.handle(SyncInput::Message(id, r#"[{"game_id":"g1"}]"#.to_string()));
        assert!(machine.view().dataset.is_empty());
        assert!(machine.handle(SyncInput::Reconnect).is_empty());
        assert!(machine.shutdown().is_empty());
    }

    #[test]
    fn test_shutdown_while_waiting_cancels_retry() {
        let (mut machine, id, _) = started(10);
        machine.handle(SyncInput::Closed(id));

        assert_eq!(machine.shutdown(), vec![Effect::CancelRetry]);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ConnectionStatus::Connecting.to_string(), "connecting");
        assert_eq!(ConnectionStatus::Failed.to_string(), "failed");
        assert_eq!(
            serde_json::to_value(ConnectionStatus::Disconnected).unwrap(),
            json!("disconnected")
        );
    }
}

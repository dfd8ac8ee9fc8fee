//! Live data synchronization
//!
//! Loads a snapshot of the dataset, then keeps it current from a streaming
//! connection, reconnecting on loss with a bounded, delayed policy.
//!
//! ## Flow
//!
//! 1. Snapshot load and stream open start together
//! 2. Every stream message replaces the dataset wholesale
//! 3. On close, the reconnection policy schedules a retry or gives up
//! 4. `reconnect()` resets the policy and opens a fresh connection
//!
//! ## Usage
//!
//! ```ignore
//! let client = LiveSyncClient::from_config(&Config::load()?)?;
//! let mut views = client.subscribe();
//! while views.changed().await.is_ok() {
//!     let view = views.borrow().clone();
//!     println!("{} games ({})", view.dataset.len(), view.status);
//! }
//! ```

mod client;
mod message;
mod persistent;
mod policy;
mod snapshot;
mod state;
mod transport;

pub use client::LiveSyncClient;
pub use message::{decode_snapshot, decode_stream_payload};
pub use persistent::{spawn_sync_task, PersistentSyncHandle, SyncCommand};
pub use policy::{Backoff, ReconnectPolicy, RetryConfig, RetryDecision};
pub use snapshot::{HttpSnapshotSource, SnapshotSource};
pub use state::{
    AttemptId, ConnectionStatus, Effect, Phase, SnapshotTicket, SyncInput, SyncMachine, SyncView,
};
pub use transport::{FrameStream, StreamConnector, WebSocketConnector};

//! livesync Core Library
//!
//! Keeps a local copy of a live dataset (games and scores) synchronized with
//! a remote service: one snapshot request at startup, then full-dataset
//! updates over a persistent WebSocket, with bounded reconnection.
//!
//! # Quick Start
//!
//! ```text
//! let config = Config::load()?;
//! let client = LiveSyncClient::from_config(&config)?;
//!
//! let view = client.view();
//! println!("{} games, {}", view.dataset.len(), view.status);
//!
//! // After giving up, start over
//! client.reconnect();
//! ```
//!
//! # Modules
//!
//! - `sync`: client, state machine, reconnection policy and transports
//! - `models`: dataset, records and the typed game view
//! - `error`: sync error taxonomy
//! - `config`: application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod sync;

pub use config::Config;
pub use error::{SyncError, SyncResult};
pub use models::{Dataset, Game, Record};
pub use sync::{ConnectionStatus, LiveSyncClient, SyncView};

//! Sync error handling
//!
//! Every failure the client can run into is converted into a `SyncError`
//! and then into the human-readable `last_error` of the published view.
//! Nothing in here is ever returned past the client boundary.

use thiserror::Error;

/// Errors that can occur while loading or streaming the dataset
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The stream connection could not be established
    #[error("Failed to open stream connection to '{url}': {details}")]
    Connect { url: String, details: String },

    /// The stream connection failed after it was established
    #[error("Stream connection error: {0}")]
    Transport(String),

    /// A stream message or snapshot body was not a sequence of records
    #[error("Failed to parse game data: {0}")]
    Decode(String),

    /// The snapshot request failed (network error or non-success status)
    #[error("Failed to fetch games: {0}")]
    Snapshot(String),

    /// The reconnection ceiling was reached
    #[error("Max reconnection attempts reached ({attempts}). Backend may not be ready.")]
    Exhausted { attempts: u32 },
}

impl SyncError {
    /// Check if this error concerns the payload rather than the connection
    ///
    /// Decode failures are recorded but never tear down a live stream.
    pub fn is_decode(&self) -> bool {
        matches!(self, SyncError::Decode(_))
    }

    /// Check if this error is followed by a reconnection attempt
    ///
    /// Only connection-level failures lead to a close, and only a close
    /// drives the reconnection policy.
    pub fn drives_reconnect(&self) -> bool {
        matches!(self, SyncError::Connect { .. } | SyncError::Transport(_))
    }

    /// Check if manual intervention is needed to recover
    pub fn is_terminal(&self) -> bool {
        matches!(self, SyncError::Exhausted { .. })
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(error: serde_json::Error) -> Self {
        SyncError::Decode(error.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return SyncError::Decode(error.to_string());
        }
        match error.status() {
            Some(status) => SyncError::Snapshot(format!("HTTP {}", status.as_u16())),
            None => SyncError::Snapshot(error.to_string()),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        SyncError::Transport(error.to_string())
    }
}

/// Result type for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

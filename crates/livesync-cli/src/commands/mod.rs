//! Command handlers

pub mod config;
pub mod snapshot;
pub mod watch;

//! Reconnection policy
//!
//! Decides whether, and after how long, a closed stream is retried.
//! Independent of any transport or timer; the caller schedules the delay.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay grows between consecutive attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every attempt
    #[default]
    Fixed,
    /// Delay doubles per attempt, capped at the maximum interval
    Exponential,
}

impl fmt::Display for Backoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backoff::Fixed => write!(f, "fixed"),
            Backoff::Exponential => write!(f, "exponential"),
        }
    }
}

impl FromStr for Backoff {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(Backoff::Fixed),
            "exponential" => Ok(Backoff::Exponential),
            _ => anyhow::bail!("Invalid backoff '{}'. Use 'fixed' or 'exponential'.", s),
        }
    }
}

/// Reconnection policy parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Delay before a reconnection attempt (the base delay for exponential)
    pub retry_interval: Duration,
    /// Upper bound on the delay
    pub max_retry_interval: Duration,
    /// Consecutive failed attempts tolerated before giving up
    pub max_attempts: u32,
    /// Delay growth
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
            max_retry_interval: Duration::from_secs(30),
            max_attempts: 10,
            backoff: Backoff::Fixed,
        }
    }
}

impl RetryConfig {
    /// Delay before the given retry (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.retry_interval,
            Backoff::Exponential => {
                let shift = attempt.saturating_sub(1).min(16);
                self.retry_interval
                    .saturating_mul(1 << shift)
                    .min(self.max_retry_interval.max(self.retry_interval))
            }
        }
    }
}

/// Outcome of a closed connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`
    Retry { attempt: u32, delay: Duration },
    /// Ceiling reached; only a manual reconnect recovers
    Exhausted { attempts: u32 },
}

/// Consecutive-failure counter plus the parameters that bound it
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    config: RetryConfig,
    failures: u32,
}

impl ReconnectPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            failures: 0,
        }
    }

    /// Consecutive failed attempts since the last successful open
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// A connection opened successfully
    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    /// Manual reconnect requested
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// A connection closed; count it and decide what happens next
    pub fn on_closed(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.config.max_attempts {
            RetryDecision::Exhausted {
                attempts: self.failures,
            }
        } else {
            RetryDecision::Retry {
                attempt: self.failures,
                delay: self.config.delay_for(self.failures),
            }
        }
    }
}

//! Snapshot loading
//!
//! One request for the full current dataset. The body is returned as raw
//! JSON; shape handling happens in the state machine so that every source
//! follows the same envelope rules.

use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use tracing::debug;

use crate::error::SyncResult;

/// Supplies the full current dataset on demand
pub trait SnapshotSource: Send + Sync + 'static {
    fn fetch(&self) -> BoxFuture<'static, SyncResult<Value>>;
}

/// Snapshot over HTTP GET
#[derive(Debug, Clone)]
pub struct HttpSnapshotSource {
    client: reqwest::Client,
    url: String,
}

impl HttpSnapshotSource {
    /// Build a source; without a timeout requests wait indefinitely
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> SyncResult<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SnapshotSource for HttpSnapshotSource {
    fn fetch(&self) -> BoxFuture<'static, SyncResult<Value>> {
        let client = self.client.clone();
        let url = self.url.clone();
        async move {
            debug!("Fetching snapshot from {}", url);
            let response = client.get(&url).send().await?.error_for_status()?;
            let body = response.json::<Value>().await?;
            Ok(body)
        }
        .boxed()
    }
}

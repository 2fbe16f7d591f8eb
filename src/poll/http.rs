//! HTTP signal source
//!
//! GETs `{base}/signals`, `{base}/signals/candidates` and `{base}/events`,
//! passing the fetch scope as `symbol` / `timeframe` query parameters.

use super::types::{FetchScope, PullKind, SourceError};
use super::SignalSource;
use crate::normalize::records;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Keys a response object may wrap its record array in
const WRAPPERS: &[&str] = &["signals", "candidates", "events", "data", "items"];

/// Signal API client
pub struct HttpSignalSource {
    base_url: String,
    client: Client,
}

impl HttpSignalSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self, kind: PullKind) -> String {
        format!("{}/{}", self.base_url, kind.path())
    }
}

#[async_trait]
impl SignalSource for HttpSignalSource {
    async fn fetch(&self, kind: PullKind, scope: &FetchScope) -> Result<Vec<Value>, SourceError> {
        let url = self.endpoint(kind);
        tracing::debug!(url = %url, ?scope, "Fetching");

        let response = self.client.get(&url).query(&scope.query()).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status { status, body });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;
        Ok(extract_records(&body))
    }
}

/// Records from a bare array, a wrapped array or a single object
pub fn extract_records(body: &Value) -> Vec<Value> {
    records(body, WRAPPERS).into_iter().cloned().collect()
}

//! Change-feed client: the upstream document database exposes a monotone,
//! resumable stream of document mutations per (instance, docType).

use crate::error::{Result, SkilletError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Parameters for one feed read.
#[derive(Debug, Clone)]
pub struct ChangesRequest {
    pub doc_type: String,
    /// Opaque cursor to resume from; `"0"` reads the feed from the beginning.
    pub since: String,
    pub include_docs: bool,
}

/// One document mutation as delivered by the feed.
#[derive(Debug, Clone, Deserialize)]
pub struct Change {
    pub id: String,
    #[serde(default, rename = "deleted")]
    pub deleted: bool,
    #[serde(default)]
    pub doc: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangesResponse {
    pub results: Vec<Change>,
    pub last_seq: String,
}

/// Read-only view of the upstream change feed.
#[async_trait]
pub trait ChangesSource: Send + Sync {
    async fn changes(&self, instance: &str, request: &ChangesRequest) -> Result<ChangesResponse>;
}

/// HTTP implementation against the document database.
pub struct HttpChangesSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpChangesSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        HttpChangesSource {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl ChangesSource for HttpChangesSource {
    async fn changes(&self, instance: &str, request: &ChangesRequest) -> Result<ChangesResponse> {
        let url = format!(
            "{}/{}/{}/_changes?since={}&include_docs={}",
            self.base_url, instance, request.doc_type, request.since, request.include_docs
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SkilletError::Feed(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(SkilletError::Feed(format!(
                "feed returned {} for {}",
                response.status(),
                url
            )));
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|e| SkilletError::Feed(format!("invalid feed response: {}", e)))
    }
}

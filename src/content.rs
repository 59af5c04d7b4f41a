//! File-content extractor: an opaque call returning the plain text body of a
//! file document. The real extractor lives outside this service and is
//! injected at construction time.

use crate::error::{Result, SkilletError};
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, instance: &str, doc_id: &str) -> Result<String>;
}

/// Placeholder fetcher returning empty text. Used when no extractor is
/// configured; file metadata is still indexed, bodies are not.
pub struct NoopContentFetcher;

#[async_trait]
impl ContentFetcher for NoopContentFetcher {
    async fn fetch(&self, _instance: &str, _doc_id: &str) -> Result<String> {
        Ok(String::new())
    }
}

/// HTTP fetcher against an external extraction service.
pub struct HttpContentFetcher {
    base_url: String,
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        HttpContentFetcher {
            base_url: base_url.into(),
            client,
        }
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch(&self, instance: &str, doc_id: &str) -> Result<String> {
        let url = format!("{}/{}/{}/content", self.base_url, instance, doc_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SkilletError::Extraction(format!("request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(SkilletError::Extraction(format!(
                "extractor returned {} for {}",
                response.status(),
                url
            )));
        }

        response
            .text()
            .await
            .map_err(|e| SkilletError::Extraction(e.to_string()))
    }
}

//! HTTP client for the read-side query service: ships shard-store snapshots
//! and delete notifications after successful update passes.

use crate::error::{Result, SkilletError};
use std::path::Path;
use std::time::Duration;

pub const INDEX_STORE_CONTENT_TYPE: &str = "application/indexstore";

pub struct QueryClient {
    base_url: String,
    client: reqwest::Client,
}

impl QueryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        QueryClient {
            base_url: base_url.into(),
            client,
        }
    }

    /// POST a replicated store file to the read side.
    pub async fn send_store(
        &self,
        instance: &str,
        doc_type: &str,
        lang: &str,
        store_path: &Path,
    ) -> Result<()> {
        let body = std::fs::read(store_path)?;
        let url = format!(
            "{}/fulltext/_update_index_alias/{}/{}/{}",
            self.base_url, instance, doc_type, lang
        );

        let response = self
            .client
            .post(&url)
            .header(http::header::CONTENT_TYPE, INDEX_STORE_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| SkilletError::QuerySide(format!("POST {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(SkilletError::QuerySide(format!(
                "read side returned {} for {}",
                response.status(),
                url
            )));
        }
        Ok(())
    }

    /// Tell the read side to drop its copy of a shard.
    pub async fn notify_delete(&self, instance: &str, doc_type: &str, lang: &str) -> Result<()> {
        let url = format!(
            "{}/fulltext/_delete_index_query/{}/{}/{}",
            self.base_url, instance, doc_type, lang
        );

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| SkilletError::QuerySide(format!("POST {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(SkilletError::QuerySide(format!(
                "read side returned {} for {}",
                response.status(),
                url
            )));
        }
        Ok(())
    }
}

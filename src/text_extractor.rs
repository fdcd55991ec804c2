//! The external text-extraction boundary: a byte buffer goes in, optional text
//! comes back. No extraction logic lives on this side of the trait — only the HTTP
//! call to the configured Tika endpoint.

use async_trait::async_trait;
use serde::Deserialize;

use super::error::Result;

/// Converts a document's raw bytes into plain text, when the backing service can.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, bytes: &[u8]) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct TikaResponse {
    content: Option<String>,
}

/// Posts the raw buffer to a Tika server's `/tika` endpoint and reads back `{content}`.
/// An empty or missing `content` field is treated as "no text", not an error.
pub struct TikaTextExtractor {
    client: reqwest::Client,
    base_url: String,
}

impl TikaTextExtractor {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl TextExtractor for TikaTextExtractor {
    async fn extract(&self, bytes: &[u8]) -> Result<Option<String>> {
        let url = format!("{}/tika", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .put(&url)
            .header("Accept", "application/json")
            .body(bytes.to_vec())
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "text extraction service returned non-success");
            return Ok(None);
        }

        let parsed: TikaResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("text extraction response was not valid JSON: {e}");
                return Ok(None);
            }
        };

        Ok(parsed.content.filter(|s| !s.is_empty()))
    }
}

/// No-op extractor used when text extraction is disabled (no `tika_url` configured).
pub struct NullTextExtractor;

#[async_trait]
impl TextExtractor for NullTextExtractor {
    async fn extract(&self, _bytes: &[u8]) -> Result<Option<String>> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_extractor_always_returns_none() {
        let extractor = NullTextExtractor;
        assert_eq!(extractor.extract(b"anything").await.unwrap(), None);
    }
}

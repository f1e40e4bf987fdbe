//! Shared HTTP transport for OpenAI-compatible endpoints.

use crate::error::{EmbedError, Result};
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// A JSON-over-HTTP client with bearer auth and bounded exponential backoff.
#[derive(Debug, Clone)]
pub(crate) struct ApiClient {
    client: Client,
    base_url: String,
    max_retries: usize,
    retry_backoff: Duration,
}

impl ApiClient {
    pub(crate) fn new(
        api_key: &str,
        base_url: &str,
        timeout: Duration,
        max_retries: usize,
        retry_backoff: Duration,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| EmbedError::invalid_config("API key contains invalid header characters"))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_retries,
            retry_backoff,
        })
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POSTs `body` to `path` and decodes the JSON response, retrying
    /// transient failures up to `max_retries` times.
    pub(crate) async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let endpoint = self.endpoint(path);
        let mut attempt = 0usize;
        loop {
            match self.post_once(&endpoint, body).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff(attempt);
                    tracing::warn!(
                        "Request to {} failed ({}), retrying in {:?} (attempt {}/{})",
                        endpoint,
                        err,
                        delay,
                        attempt,
                        self.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn post_once<B, R>(&self, endpoint: &str, body: &B) -> Result<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self.client.post(endpoint).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(EmbedError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| {
            EmbedError::unexpected_response(format!("failed to decode response body: {e}"))
        })
    }

    fn backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.saturating_sub(1).min(5) as u32;
        self.retry_backoff * (1u32 << capped)
    }
}

//! OpenAI-compatible embedding client

use crate::config::EmbeddingConfig;
use crate::embedding::{truncate_chars, Embedder, EmbeddingError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Attempts per request for rate-limited or failing responses
const MAX_ATTEMPTS: u32 = 3;

/// Text sent once to discover the model's dimensionality
const SAMPLE_TEXT: &str = "dimension check";

/// Embeddings client that talks to OpenAI-compatible `/embeddings` endpoints
pub struct HttpEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    configured_dimensions: Option<usize>,
    discovered_dimensions: OnceCell<usize>,
    max_input_chars: usize,
}

impl HttpEmbedder {
    /// Builds a new embeddings client
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = config.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let auth = format!("Bearer {}", key.trim());
            let value = HeaderValue::from_str(&auth)
                .map_err(|_| EmbeddingError::Unavailable("invalid embedding API key".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            configured_dimensions: config.dimensions,
            discovered_dimensions: OnceCell::new(),
            max_input_chars: config.max_input_chars,
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let input = truncate_chars(text, self.max_input_chars);
        let request = EmbeddingRequest {
            model: &self.model,
            input: [input],
            dimensions: self.configured_dimensions,
        };

        let mut attempt = 1;
        loop {
            let response = self.client.post(&self.endpoint).json(&request).send().await;

            let resp = match response {
                Ok(resp) => resp,
                Err(err) if is_retryable_error(&err) && attempt < MAX_ATTEMPTS => {
                    tokio::time::sleep(retry_backoff(attempt)).await;
                    attempt += 1;
                    continue;
                }
                Err(err) => return Err(err.into()),
            };

            let status = resp.status();
            if status.is_success() {
                let parsed: EmbeddingResponse = resp
                    .json()
                    .await
                    .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
                return parsed
                    .data
                    .into_iter()
                    .min_by_key(|entry| entry.index)
                    .map(|entry| entry.embedding)
                    .ok_or_else(|| EmbeddingError::Malformed("no embedding in response".into()));
            }

            if should_retry(status) && attempt < MAX_ATTEMPTS {
                tokio::time::sleep(retry_backoff(attempt)).await;
                attempt += 1;
                continue;
            }

            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(EmbeddingError::Status {
                status: status.as_u16(),
                body,
            });
        }
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn dimensions(&self) -> Result<usize, EmbeddingError> {
        if let Some(dims) = self.configured_dimensions {
            return Ok(dims);
        }

        let dims = self
            .discovered_dimensions
            .get_or_try_init(|| async {
                let vector = self.request(SAMPLE_TEXT).await?;
                tracing::debug!("Embedding model {} has {} dimensions", self.model, vector.len());
                Ok::<usize, EmbeddingError>(vector.len())
            })
            .await?;
        Ok(*dims)
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let vector = self.request(text).await?;

        let expected = self
            .configured_dimensions
            .or_else(|| self.discovered_dimensions.get().copied());
        if let Some(expected) = expected {
            if vector.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }

        Ok(vector)
    }
}

fn should_retry(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(250 * (1 << attempt.min(5)))
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: [&'a str; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

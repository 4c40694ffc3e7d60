//! HTTP client for OpenAI-compatible `/embeddings` endpoints.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::{default_base_url, parse_provider_model, EmbeddingsConfig};
use crate::error::{FolioError, Result};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
}

impl ApiConfig {
    pub fn from_embeddings_config(config: &EmbeddingsConfig) -> Self {
        let (provider, model) = parse_provider_model(&config.model);
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or_else(|| default_base_url(provider));

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: model.to_string(),
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        }
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

type Attempt = std::result::Result<Vec<Vec<f32>>, backoff::Error<FolioError>>;

/// Embedding client. Transient failures (429, 5xx, transport) are
/// retried with exponential backoff. Auth and other 4xx answers are not.
#[derive(Clone)]
pub struct EmbeddingApiClient {
    client: Client,
    config: ApiConfig,
    endpoint: String,
}

impl EmbeddingApiClient {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FolioError::Embedding(format!("Failed to build embedding client: {e}")))?;
        let endpoint = format!("{}/embeddings", config.base_url);

        Ok(Self {
            client,
            config,
            endpoint,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// One vector per input, in input order.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts,
        };

        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(5),
            max_elapsed_time: Some(Duration::from_secs(self.config.timeout_secs)),
            ..Default::default()
        };

        let attempts = AtomicU32::new(0);
        let (this, request, attempts) = (self, &request, &attempts);
        backoff::future::retry_notify(
            policy,
            || async move {
                let attempt = attempts.fetch_add(1, Ordering::Relaxed);
                match this.send(request).await {
                    Err(backoff::Error::Transient { err, .. })
                        if attempt >= this.config.max_retries =>
                    {
                        Err(backoff::Error::permanent(err))
                    }
                    other => other,
                }
            },
            |err: FolioError, wait: Duration| {
                tracing::debug!(error = %err, wait_ms = wait.as_millis() as u64, "Retrying embedding request");
            },
        )
        .await
    }

    async fn send(&self, request: &EmbeddingRequest<'_>) -> Attempt {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(key) = self.config.api_key.as_deref() {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| {
            backoff::Error::transient(FolioError::ServiceUnavailable(format!(
                "Embedding request failed: {e}"
            )))
        })?;

        let status = response.status();
        if status.is_success() {
            let body: EmbeddingResponse = response.json().await.map_err(|e| {
                backoff::Error::permanent(FolioError::Embedding(format!(
                    "Malformed embedding response: {e}"
                )))
            })?;
            return Ok(in_input_order(body.data));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let err = FolioError::ApiRateLimit { retry_after };
            return Err(match retry_after {
                Some(secs) => backoff::Error::retry_after(err, Duration::from_secs(secs)),
                None => backoff::Error::transient(err),
            });
        }

        let body = response.text().await.unwrap_or_default();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(backoff::Error::permanent(FolioError::ApiAuth(body)));
        }
        if status.is_server_error() {
            return Err(backoff::Error::transient(FolioError::Embedding(format!(
                "Provider answered {status}: {body}"
            ))));
        }
        Err(backoff::Error::permanent(FolioError::Embedding(format!(
            "Provider rejected request with {status}: {body}"
        ))))
    }
}

/// Providers may answer out of order when every item carries an `index`.
fn in_input_order(mut data: Vec<EmbeddingData>) -> Vec<Vec<f32>> {
    if data.iter().all(|d| d.index.is_some()) {
        data.sort_by_key(|d| d.index);
    }
    data.into_iter().map(|d| d.embedding).collect()
}

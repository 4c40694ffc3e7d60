use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use lru::LruCache;

use crate::config::EmbeddingsConfig;
use crate::error::{FolioError, Result};

use super::api::{ApiConfig, EmbeddingApiClient};

#[derive(Clone)]
enum GatewayBackend {
    Api(EmbeddingApiClient),
    Unavailable { reason: String },
}

/// Front door to the external embedding provider.
///
/// Every provider failure surfaces as [`FolioError::ServiceUnavailable`] so
/// callers can degrade (skip detection, fall back to cache-only) instead of
/// aborting the request.
#[derive(Clone)]
pub struct EmbeddingGateway {
    backend: GatewayBackend,
    dimensions: usize,
    batch_size: usize,
    cache: Option<Arc<Mutex<LruCache<String, Vec<f32>>>>>,
}

impl EmbeddingGateway {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let client = EmbeddingApiClient::new(ApiConfig::from_embeddings_config(config))?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: EmbeddingApiClient, config: &EmbeddingsConfig) -> Self {
        Self {
            backend: GatewayBackend::Api(client),
            dimensions: config.dimensions,
            batch_size: config.batch_size.max(1),
            cache: NonZeroUsize::new(config.cache_size)
                .map(|capacity| Arc::new(Mutex::new(LruCache::new(capacity)))),
        }
    }

    /// A gateway whose every call fails with `ServiceUnavailable`.
    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: GatewayBackend::Unavailable {
                reason: reason.to_string(),
            },
            dimensions: 0,
            batch_size: 1,
            cache: None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.backend, GatewayBackend::Api(_))
    }

    /// Configured vector length. Stored vectors are checked per owner, not
    /// against this value.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn model(&self) -> Option<&str> {
        match &self.backend {
            GatewayBackend::Api(client) => Some(client.model()),
            GatewayBackend::Unavailable { .. } => None,
        }
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FolioError::Validation(
                "Cannot embed empty text".to_string(),
            ));
        }

        if let Some(hit) = self.cached(text) {
            return Ok(hit);
        }

        let client = self.client()?;
        let mut vectors = client.embed(&[text]).await.map_err(unavailable)?;
        let vector = vectors.pop().filter(|v| !v.is_empty()).ok_or_else(|| {
            FolioError::ServiceUnavailable("Embedding provider returned no vector".to_string())
        })?;

        self.remember(text, &vector);
        Ok(vector)
    }

    /// [`embed`](Self::embed) bounded by a caller-imposed timeout.
    pub async fn embed_with_timeout(&self, text: &str, timeout: Duration) -> Result<Vec<f32>> {
        match tokio::time::timeout(timeout, self.embed(text)).await {
            Ok(result) => result,
            Err(_) => Err(FolioError::ServiceUnavailable(format!(
                "Embedding timed out after {}ms",
                timeout.as_millis()
            ))),
        }
    }

    /// Best-effort batch embedding, one result per input in input order.
    ///
    /// Each chunk of `batch_size` texts is sent as one request; if that
    /// request fails or returns the wrong number of vectors, the chunk is
    /// retried item by item so one bad input cannot sink its neighbours.
    pub async fn embed_batch(&self, texts: &[String]) -> Vec<Result<Vec<f32>>> {
        if texts.is_empty() {
            return Vec::new();
        }

        let client = match self.client() {
            Ok(client) => client,
            Err(e) => {
                let reason = e.to_string();
                return texts
                    .iter()
                    .map(|_| Err(FolioError::ServiceUnavailable(reason.clone())))
                    .collect();
            }
        };

        let mut results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            let trimmed: Vec<&str> = chunk.iter().map(|t| t.trim()).collect();
            let batched = if trimmed.iter().any(|t| t.is_empty()) {
                None
            } else {
                match client.embed(&trimmed).await {
                    Ok(vectors) if vectors.len() == trimmed.len() => Some(vectors),
                    Ok(vectors) => {
                        tracing::warn!(
                            expected = trimmed.len(),
                            received = vectors.len(),
                            "Batch embedding returned wrong count, falling back to single calls"
                        );
                        None
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            size = trimmed.len(),
                            "Batch embedding failed, falling back to single calls"
                        );
                        None
                    }
                }
            };

            match batched {
                Some(vectors) => {
                    for (text, vector) in trimmed.iter().zip(vectors) {
                        self.remember(text, &vector);
                        results.push(Ok(vector));
                    }
                }
                None => {
                    let singles = join_all(trimmed.iter().map(|text| self.embed(text))).await;
                    results.extend(singles);
                }
            }
        }

        results
    }

    /// Encoding persisted in embedding columns.
    pub fn format_for_storage(vector: &[f32]) -> String {
        let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
        format!("[{}]", parts.join(","))
    }

    pub fn parse_from_storage(raw: &str) -> Result<Vec<f32>> {
        serde_json::from_str(raw)
            .map_err(|e| FolioError::Internal(format!("Corrupt stored embedding: {e}")))
    }

    fn client(&self) -> Result<&EmbeddingApiClient> {
        match &self.backend {
            GatewayBackend::Api(client) => Ok(client),
            GatewayBackend::Unavailable { reason } => {
                Err(FolioError::ServiceUnavailable(reason.clone()))
            }
        }
    }

    fn cached(&self, text: &str) -> Option<Vec<f32>> {
        let cache = self.cache.as_ref()?;
        let mut guard = cache.lock().ok()?;
        guard.get(text).cloned()
    }

    fn remember(&self, text: &str, vector: &[f32]) {
        if let Some(cache) = &self.cache {
            if let Ok(mut guard) = cache.lock() {
                guard.put(text.to_string(), vector.to_vec());
            }
        }
    }
}

/// Collapse provider errors into the degradable variant.
fn unavailable(error: FolioError) -> FolioError {
    match error {
        FolioError::ServiceUnavailable(_) => error,
        other => FolioError::ServiceUnavailable(other.to_string()),
    }
}

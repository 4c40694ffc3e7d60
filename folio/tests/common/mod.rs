//! Shared fixtures for integration tests: a temporary database plus wiremock
//! stand-ins for the embedding provider and the chat model.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

use folio::config::{DatabaseConfig, EmbeddingsConfig, LlmConfig};
use folio::db::{Database, DatabaseBackend, LibSqlBackend};
use folio::embeddings::EmbeddingGateway;
use folio::llm::LlmProvider;

pub const DIMS: usize = 4;

/// Keeps the temporary directory alive as long as the backend is used.
pub struct TestDb {
    _dir: TempDir,
    pub db: Arc<dyn DatabaseBackend>,
}

pub async fn test_db() -> TestDb {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let config = DatabaseConfig {
        url: format!("file:{}", dir.path().join("folio_test.db").display()),
        auth_token: None,
        local_path: None,
    };
    let raw = Database::new(&config).await.expect("Failed to open test database");
    TestDb {
        _dir: dir,
        db: Arc::new(LibSqlBackend::new(raw)),
    }
}

/// Answers `/embeddings` requests from a fixed text-to-vector table. Texts
/// not in the table get `fallback`.
pub struct VectorTable {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
}

impl VectorTable {
    pub fn new(entries: &[(&str, Vec<f32>)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, vector)| (text.to_string(), vector.clone()))
                .collect(),
            fallback: vec![0.0, 0.0, 0.0, 1.0],
        }
    }
}

impl Respond for VectorTable {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };
        let inputs = body["input"].as_array().cloned().unwrap_or_default();
        let data: Vec<_> = inputs
            .iter()
            .enumerate()
            .map(|(index, input)| {
                let text = input.as_str().unwrap_or_default();
                let vector = self.vectors.get(text).unwrap_or(&self.fallback);
                json!({ "index": index, "embedding": vector })
            })
            .collect();
        ResponseTemplate::new(200).set_body_json(json!({ "data": data }))
    }
}

pub async fn mount_embeddings(server: &MockServer, table: VectorTable) {
    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(table)
        .mount(server)
        .await;
}

pub fn embeddings_for(server: &MockServer) -> EmbeddingGateway {
    EmbeddingGateway::new(&EmbeddingsConfig {
        model: "openai/text-embedding-3-small".to_string(),
        api_key: Some("test-key".to_string()),
        base_url: Some(server.uri()),
        dimensions: DIMS,
        batch_size: 16,
        timeout_secs: 5,
        max_retries: 0,
        cache_size: 0,
    })
    .expect("embedding gateway")
}

pub fn llm_for(server: &MockServer) -> LlmProvider {
    LlmProvider::new(Some(&LlmConfig {
        model: "openai/gpt-4o-mini".to_string(),
        api_key: Some("test-key".to_string()),
        base_url: Some(server.uri()),
        timeout_secs: 5,
        max_retries: 0,
    }))
}

pub fn chat_response(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "created": 1,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
    })
}

/// Unit vector in the plane of the first two axes with cosine `sim` to
/// `[1, 0, 0, 0]`.
pub fn at_similarity(sim: f32) -> Vec<f32> {
    vec![sim, (1.0 - sim * sim).sqrt(), 0.0, 0.0]
}

use axum::extract::State;
use serde::Serialize;

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;

/// Health data returned inside the v1 envelope.
#[derive(Debug, Clone, Serialize)]
pub struct HealthData {
    pub status: String,
    pub version: String,
    pub database: DatabaseStatus,
    pub embeddings: EmbeddingsStatus,
    pub llm: LlmStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingsStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub dimensions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn availability(available: bool) -> String {
    if available { "available" } else { "unavailable" }.to_string()
}

/// `GET /api/v1/health`
///
/// Always answers 200; `status` is `degraded` when a provider is missing
/// and `error` when the store cannot be reached.
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let db_ok = match state.db.sync().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Health check database sync failed");
            false
        }
    };

    let embeddings = EmbeddingsStatus {
        status: availability(state.embeddings.is_available()),
        model: state.embeddings.model().map(str::to_string),
        dimensions: state.embeddings.dimensions(),
    };

    let llm = if state.llm.is_available() {
        LlmStatus {
            status: availability(true),
            provider: Some(state.llm.backend().name().to_string()),
            model: state.llm.config().map(|c| c.model.clone()),
        }
    } else {
        LlmStatus {
            status: availability(false),
            provider: None,
            model: None,
        }
    };

    let status = if !db_ok {
        "error"
    } else if state.embeddings.is_available() && state.llm.is_available() {
        "ok"
    } else {
        "degraded"
    };

    ApiResponse::success(HealthData {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseStatus {
            status: if db_ok { "ok" } else { "error" }.to_string(),
        },
        embeddings,
        llm,
    })
}

use axum::extract::State;

use crate::api::v1::response::ApiResponse;
use crate::api::{AppJson, AppState, OwnerId};
use crate::intelligence::{DetectionReport, DetectionTarget};

/// `POST /api/v1/relationships/detect`
///
/// Body: `{"kind": "memory" | "note" | "document", "id": "..."}`.
pub async fn detect_relationships(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppJson(target): AppJson<DetectionTarget>,
) -> ApiResponse<DetectionReport> {
    state.detector.detect(&owner, &target).await.into()
}

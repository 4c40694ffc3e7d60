use axum::extract::State;

use crate::api::v1::dto::BuildContextRequest;
use crate::api::v1::response::{ApiResponse, ErrorCode};
use crate::api::{AppJson, AppState, OwnerId};
use crate::models::{ContextBundle, ContextLimits};

/// `POST /api/v1/context`
pub async fn build_context(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<BuildContextRequest>,
) -> ApiResponse<ContextBundle> {
    if req.query.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "query must not be empty");
    }
    let limits = req
        .limits
        .unwrap_or_else(|| ContextLimits::from(&state.config.context));
    state.context.build(&owner, &req.query, limits).await.into()
}

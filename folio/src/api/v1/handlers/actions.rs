use axum::extract::{Query, State};

use crate::api::v1::dto::{ClearCacheParams, DeletedResponse, TranslateActionRequest};
use crate::api::v1::response::ApiResponse;
use crate::api::{AppJson, AppState, OwnerId};
use crate::models::{ActionCacheStats, ActionResolution};

const DEFAULT_MAX_AGE_DAYS: u32 = 30;

/// `POST /api/v1/actions/translate`
///
/// Translation failures are reported inside the resolution, not as an HTTP
/// error, so clients can fall back to plain chat.
pub async fn translate_action(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<TranslateActionRequest>,
) -> ApiResponse<ActionResolution> {
    state
        .actions
        .get_or_translate(&owner, &req.query)
        .await
        .into()
}

/// `DELETE /api/v1/actions/cache?maxAgeDays=`
pub async fn clear_action_cache(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<ClearCacheParams>,
) -> ApiResponse<DeletedResponse> {
    let max_age_days = params.max_age_days.unwrap_or(DEFAULT_MAX_AGE_DAYS);
    match state.actions.clear_old_entries(&owner, max_age_days).await {
        Ok(deleted) => ApiResponse::success(DeletedResponse { deleted }),
        Err(e) => e.into(),
    }
}

/// `GET /api/v1/actions/stats`
pub async fn action_cache_stats(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
) -> ApiResponse<ActionCacheStats> {
    state.actions.stats(&owner).await.into()
}

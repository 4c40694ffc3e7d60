use axum::extract::{Query, State};

use crate::api::v1::dto::RebuildInterestsParams;
use crate::api::v1::response::ApiResponse;
use crate::api::{AppState, OwnerId};
use crate::models::InterestProfile;

/// `GET /api/v1/interests`
///
/// Owners without a stored profile get an empty one rather than a 404.
pub async fn get_interests(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
) -> ApiResponse<InterestProfile> {
    match state.interests.latest(&owner).await {
        Ok(Some(profile)) => ApiResponse::success(profile),
        Ok(None) => ApiResponse::success(InterestProfile::empty(
            &owner,
            state.config.interests.window_days,
        )),
        Err(e) => e.into(),
    }
}

/// `POST /api/v1/interests/rebuild?windowDays=`
pub async fn rebuild_interests(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<RebuildInterestsParams>,
) -> ApiResponse<InterestProfile> {
    let window_days = params
        .window_days
        .unwrap_or(state.config.interests.window_days);
    state.interests.rebuild(&owner, window_days).await.into()
}

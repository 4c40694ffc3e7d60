//! v1 graph handlers.
//!
//! Memory-graph traversal and analysis, plus the unified document, note and
//! memory graph.

use axum::extract::{Path, Query, State};

use crate::api::v1::dto::{
    ClusterParams, DocumentGraphParams, GraphSearchRequest, ListParams, PathParams, RelatedParams,
    TimelineParams,
};
use crate::api::v1::response::{ApiResponse, ErrorCode};
use crate::api::{AppJson, AppState, OwnerId};
use crate::models::{
    CentralMemory, MemoryCluster, MemoryGraph, MemoryPath, TimelineEntry, UnifiedGraph,
    UnifiedSearchHit,
};

const DEFAULT_DEPTH: u32 = 2;
const DEFAULT_CENTRAL_LIMIT: usize = 10;
const DEFAULT_CLUSTER_THRESHOLD: f32 = 0.8;
const MAX_RESULTS: usize = 100;

/// `GET /api/v1/memories/{memoryId}/related?depth=`
pub async fn related_memories(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(memory_id): Path<String>,
    Query(params): Query<RelatedParams>,
) -> ApiResponse<MemoryGraph> {
    let depth = params.depth.unwrap_or(DEFAULT_DEPTH);
    state
        .graph
        .memory_graph()
        .get_related_memories(&owner, &memory_id, depth)
        .await
        .into()
}

/// `GET /api/v1/memories/path?from=&to=`
pub async fn find_path(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<PathParams>,
) -> ApiResponse<MemoryPath> {
    state
        .graph
        .memory_graph()
        .find_path(&owner, &params.from, &params.to)
        .await
        .into()
}

/// `GET /api/v1/memories/central?limit=`
pub async fn central_memories(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<ListParams>,
) -> ApiResponse<Vec<CentralMemory>> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_CENTRAL_LIMIT)
        .clamp(1, MAX_RESULTS);
    state
        .graph
        .memory_graph()
        .get_central_memories(&owner, limit)
        .await
        .into()
}

/// `GET /api/v1/memories/clusters?threshold=`
pub async fn clusters(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<ClusterParams>,
) -> ApiResponse<Vec<MemoryCluster>> {
    let threshold = params.threshold.unwrap_or(DEFAULT_CLUSTER_THRESHOLD);
    state
        .graph
        .memory_graph()
        .cluster_by_similarity(&owner, threshold)
        .await
        .into()
}

/// `GET /api/v1/documents/{documentId}/graph?maxDepth=`
pub async fn document_graph(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(document_id): Path<String>,
    Query(params): Query<DocumentGraphParams>,
) -> ApiResponse<UnifiedGraph> {
    let max_depth = params.max_depth.unwrap_or(DEFAULT_DEPTH);
    state
        .graph
        .get_document_centric_graph(&owner, &document_id, max_depth)
        .await
        .into()
}

/// `POST /api/v1/graph/search`
pub async fn search_across_graphs(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<GraphSearchRequest>,
) -> ApiResponse<Vec<UnifiedSearchHit>> {
    if req.query.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "query must not be empty");
    }
    let limit = req
        .limit
        .unwrap_or(state.config.search.default_limit)
        .clamp(1, MAX_RESULTS);
    state
        .graph
        .search_across_graphs(&owner, &req.query, limit)
        .await
        .into()
}

/// `GET /api/v1/graph/timeline?concept=`
pub async fn timeline(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<TimelineParams>,
) -> ApiResponse<Vec<TimelineEntry>> {
    if params.concept.trim().is_empty() {
        return ApiResponse::error(ErrorCode::InvalidRequest, "concept must not be empty");
    }
    state.graph.get_timeline(&owner, &params.concept).await.into()
}

//! v1 memory handlers: extraction, search, lookup and scoped deletion.

use axum::extract::{Path, Query, State};

use crate::api::v1::dto::{
    DeletedResponse, ExtractMemoriesRequest, ListParams, SearchMemoriesRequest,
};
use crate::api::v1::response::ApiResponse;
use crate::api::{AppJson, AppState, OwnerId};
use crate::models::{ExtractionReport, MemoryEntity, MemorySearchHit};

const MAX_LIST_LIMIT: usize = 200;

/// `POST /api/v1/memories/extract`
pub async fn extract_memories(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<ExtractMemoriesRequest>,
) -> ApiResponse<ExtractionReport> {
    state
        .memory
        .extract_and_store(
            &owner,
            req.conversation_id.as_deref(),
            &req.turns,
            req.document.as_ref(),
        )
        .await
        .into()
}

/// `POST /api/v1/memories/search`
pub async fn search_memories(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<SearchMemoriesRequest>,
) -> ApiResponse<Vec<MemorySearchHit>> {
    state
        .memory
        .search_memories(&owner, &req.query, &req.filters)
        .await
        .into()
}

/// `GET /api/v1/memories?limit=`
pub async fn list_memories(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Query(params): Query<ListParams>,
) -> ApiResponse<Vec<MemoryEntity>> {
    let limit = params
        .limit
        .unwrap_or(state.config.search.default_limit)
        .clamp(1, MAX_LIST_LIMIT);
    state.memory.list_entities(&owner, limit).await.into()
}

/// `GET /api/v1/memories/{memoryId}`
pub async fn get_memory(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(memory_id): Path<String>,
) -> ApiResponse<MemoryEntity> {
    state.memory.get_entity(&owner, &memory_id).await.into()
}

/// `DELETE /api/v1/conversations/{conversationId}/memories`
pub async fn delete_conversation_memories(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(conversation_id): Path<String>,
) -> ApiResponse<DeletedResponse> {
    match state
        .memory
        .delete_for_conversation(&owner, &conversation_id)
        .await
    {
        Ok(deleted) => ApiResponse::success(DeletedResponse { deleted }),
        Err(e) => e.into(),
    }
}

/// `DELETE /api/v1/documents/{documentId}/memories`
pub async fn delete_document_memories(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(document_id): Path<String>,
) -> ApiResponse<DeletedResponse> {
    match state.memory.delete_for_document(&owner, &document_id).await {
        Ok(deleted) => ApiResponse::success(DeletedResponse { deleted }),
        Err(e) => e.into(),
    }
}

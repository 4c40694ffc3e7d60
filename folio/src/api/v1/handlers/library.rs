//! v1 document and note registration.

use axum::extract::{Path, State};

use crate::api::v1::response::ApiResponse;
use crate::api::{AppJson, AppState, OwnerId};
use crate::models::{CreateDocumentRequest, CreateNoteRequest, Document, Note};

/// `POST /api/v1/documents`
pub async fn create_document(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<CreateDocumentRequest>,
) -> ApiResponse<Document> {
    match state.library.add_document(&owner, req).await {
        Ok(document) => ApiResponse::created(document),
        Err(e) => e.into(),
    }
}

/// `DELETE /api/v1/documents/{documentId}`
pub async fn delete_document(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    Path(document_id): Path<String>,
) -> ApiResponse<()> {
    state.library.delete_document(&owner, &document_id).await.into()
}

/// `POST /api/v1/notes`
pub async fn create_note(
    State(state): State<AppState>,
    OwnerId(owner): OwnerId,
    AppJson(req): AppJson<CreateNoteRequest>,
) -> ApiResponse<Note> {
    match state.library.add_note(&owner, req).await {
        Ok(note) => ApiResponse::created(note),
        Err(e) => e.into(),
    }
}

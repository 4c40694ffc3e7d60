use std::sync::Arc;

use validator::Validate;

use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingGateway;
use crate::error::{FolioError, Result};
use crate::models::{CreateDocumentRequest, CreateNoteRequest, Document, Note};

/// Registers the documents and notes the memory graph links against.
pub struct LibraryService {
    db: Arc<dyn DatabaseBackend>,
    embeddings: EmbeddingGateway,
}

impl LibraryService {
    pub fn new(db: Arc<dyn DatabaseBackend>, embeddings: EmbeddingGateway) -> Self {
        Self { db, embeddings }
    }

    /// Stores a document, embedded when the provider is reachable. Documents
    /// stored without a vector are embedded later by relationship detection.
    pub async fn add_document(&self, owner: &str, request: CreateDocumentRequest) -> Result<Document> {
        request
            .validate()
            .map_err(|e| FolioError::Validation(e.to_string()))?;

        let mut document = Document::new(owner, &request.title, request.description.as_deref());
        match self.embeddings.embed(&document.embedding_text()).await {
            Ok(vector) => document.embedding = Some(vector),
            Err(e) if e.is_degradable() => {
                tracing::warn!(owner, error = %e, "Storing document without embedding");
            }
            Err(e) => return Err(e),
        }

        self.db.create_document(&document).await?;
        tracing::debug!(owner, document_id = %document.id, "Document stored");
        Ok(document)
    }

    /// Stores a note. Notes are embedded lazily on first scan.
    pub async fn add_note(&self, owner: &str, request: CreateNoteRequest) -> Result<Note> {
        request
            .validate()
            .map_err(|e| FolioError::Validation(e.to_string()))?;

        if let Some(document_id) = request.document_id.as_deref() {
            if self.db.get_document(owner, document_id).await?.is_none() {
                return Err(FolioError::NotFound(format!("Document {document_id}")));
            }
        }

        let mut note = Note::new(owner, request.document_id.as_deref(), &request.content);
        if let Some(highlight) = request.highlight.as_deref() {
            note = note.with_highlight(highlight);
        }

        self.db.create_note(&note).await?;
        tracing::debug!(owner, note_id = %note.id, "Note stored");
        Ok(note)
    }

    /// Removes a document along with its memories and links.
    pub async fn delete_document(&self, owner: &str, document_id: &str) -> Result<()> {
        if self.db.delete_document(owner, document_id).await? {
            Ok(())
        } else {
            Err(FolioError::NotFound(format!("Document {document_id}")))
        }
    }
}

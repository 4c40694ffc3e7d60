use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    ActionCacheEntry, ActionCacheStats, Document, DocumentLink, InterestProfile, MemoryEntity,
    MemoryRelationship, Note, NoteRelationship, RelatedType,
};

// ---------------------------------------------------------------------------
// Individual store traits. Every read and write is scoped to one owner.
// ---------------------------------------------------------------------------

/// Memory entities and their cascade deletes.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fails with `DimensionMismatch` when the embedding length differs from
    /// what the owner already stores.
    async fn create_entity(&self, entity: &MemoryEntity) -> Result<()>;
    async fn get_entity(&self, owner: &str, id: &str) -> Result<Option<MemoryEntity>>;
    async fn get_entities_by_ids(&self, owner: &str, ids: &[String]) -> Result<Vec<MemoryEntity>>;
    /// Newest `limit` entities in creation order.
    async fn list_recent_entities(&self, owner: &str, limit: usize) -> Result<Vec<MemoryEntity>>;
    async fn list_entities_since(
        &self,
        owner: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>>;
    async fn list_entities_by_degree(&self, owner: &str, limit: usize)
        -> Result<Vec<MemoryEntity>>;
    async fn list_entities_for_document(
        &self,
        owner: &str,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>>;
    async fn count_entities(&self, owner: &str) -> Result<u64>;
    async fn list_owners(&self) -> Result<Vec<String>>;
    /// Deletes the conversation's entities, their edges and note links, then
    /// recomputes degrees of surviving neighbours.
    async fn delete_conversation_memories(&self, owner: &str, conversation_id: &str)
        -> Result<u64>;
    async fn delete_document_memories(&self, owner: &str, document_id: &str) -> Result<u64>;
}

#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Returns false when an identical edge already existed.
    async fn create_relationship(&self, rel: &MemoryRelationship) -> Result<bool>;
    async fn list_relationships(&self, owner: &str, limit: usize)
        -> Result<Vec<MemoryRelationship>>;
    async fn list_relationships_touching(
        &self,
        owner: &str,
        ids: &[String],
    ) -> Result<Vec<MemoryRelationship>>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn create_document(&self, doc: &Document) -> Result<()>;
    async fn get_document(&self, owner: &str, id: &str) -> Result<Option<Document>>;
    async fn list_recent_documents(&self, owner: &str, limit: usize) -> Result<Vec<Document>>;
    async fn update_document_embedding(&self, owner: &str, id: &str, embedding: &[f32])
        -> Result<()>;
    async fn delete_document(&self, owner: &str, id: &str) -> Result<bool>;
    async fn create_document_link(&self, link: &DocumentLink) -> Result<bool>;
    async fn list_document_links(&self, owner: &str, document_id: &str)
        -> Result<Vec<DocumentLink>>;
}

#[async_trait]
pub trait NoteStore: Send + Sync {
    async fn create_note(&self, note: &Note) -> Result<()>;
    async fn get_note(&self, owner: &str, id: &str) -> Result<Option<Note>>;
    async fn list_recent_notes(&self, owner: &str, limit: usize) -> Result<Vec<Note>>;
    async fn list_notes_for_document(&self, owner: &str, document_id: &str) -> Result<Vec<Note>>;
    async fn update_note_embedding(&self, owner: &str, id: &str, embedding: &[f32]) -> Result<()>;
    async fn create_note_relationship(&self, rel: &NoteRelationship) -> Result<bool>;
    async fn list_note_relationships(&self, owner: &str, note_id: &str)
        -> Result<Vec<NoteRelationship>>;
    async fn list_note_relationships_to(
        &self,
        owner: &str,
        related_type: RelatedType,
        related_id: &str,
    ) -> Result<Vec<NoteRelationship>>;
}

#[async_trait]
pub trait ActionCacheStore: Send + Sync {
    /// Returns false when the owner already cached the same normalized query.
    async fn create_action_entry(&self, entry: &ActionCacheEntry) -> Result<bool>;
    async fn list_top_action_entries(&self, owner: &str, limit: usize)
        -> Result<Vec<ActionCacheEntry>>;
    /// Atomically adds one hit. `None` when the entry is gone.
    async fn record_action_hit(&self, owner: &str, id: &str) -> Result<Option<u32>>;
    async fn delete_action_entries_unused_since(
        &self,
        owner: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64>;
    async fn action_cache_stats(&self, owner: &str) -> Result<ActionCacheStats>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn upsert_interest_profile(&self, profile: &InterestProfile) -> Result<()>;
    async fn get_interest_profile(&self, owner: &str) -> Result<Option<InterestProfile>>;
}

// ---------------------------------------------------------------------------
// Composite backend trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DatabaseBackend:
    EntityStore + RelationshipStore + DocumentStore + NoteStore + ActionCacheStore + ProfileStore
{
    /// Sync with remote (e.g. Turso replication). No-op for local-only backends.
    async fn sync(&self) -> Result<()>;

    /// Embedding length registered for the owner, if any.
    async fn owner_dimensions(&self, owner: &str) -> Result<Option<usize>>;
}

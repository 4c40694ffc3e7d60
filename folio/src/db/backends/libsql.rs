use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::connection::Database;
use crate::db::repository::{
    ActionCacheRepository, DimensionRepository, DocumentRepository, EntityRepository,
    NoteRepository, ProfileRepository, RelationshipRepository,
};
use crate::db::traits::{
    ActionCacheStore, DatabaseBackend, DocumentStore, EntityStore, NoteStore, ProfileStore,
    RelationshipStore,
};
use crate::error::Result;
use crate::models::{
    ActionCacheEntry, ActionCacheStats, Document, DocumentLink, InterestProfile, MemoryEntity,
    MemoryRelationship, Note, NoteRelationship, RelatedType,
};

pub struct LibSqlBackend {
    db: Database,
}

impl LibSqlBackend {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn delete_memories(&self, owner: &str, ids: Vec<String>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let conn = self.db.connect()?;
        let tx = conn.transaction().await?;

        let edges = RelationshipRepository::list_touching(&tx, owner, &ids).await?;
        let doomed: BTreeSet<&String> = ids.iter().collect();
        let neighbours: Vec<String> = edges
            .iter()
            .flat_map(|e| [&e.from_id, &e.to_id])
            .filter(|id| !doomed.contains(id))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .cloned()
            .collect();

        let edges_removed = RelationshipRepository::delete_touching(&tx, owner, &ids).await?;
        NoteRepository::delete_relationships_to(&tx, owner, RelatedType::Memory, &ids).await?;
        let removed = EntityRepository::delete_by_ids(&tx, owner, &ids).await?;
        EntityRepository::recompute_degrees(&tx, owner, &neighbours).await?;
        tx.commit().await?;

        tracing::info!(
            owner,
            removed,
            edges_removed,
            neighbours = neighbours.len(),
            "Deleted memories"
        );
        Ok(removed)
    }
}

#[async_trait]
impl EntityStore for LibSqlBackend {
    async fn create_entity(&self, entity: &MemoryEntity) -> Result<()> {
        let conn = self.db.connect()?;
        DimensionRepository::ensure(&conn, &entity.owner, entity.embedding.len()).await?;
        EntityRepository::create(&conn, entity).await
    }
    async fn get_entity(&self, owner: &str, id: &str) -> Result<Option<MemoryEntity>> {
        let conn = self.db.connect()?;
        EntityRepository::get(&conn, owner, id).await
    }
    async fn get_entities_by_ids(&self, owner: &str, ids: &[String]) -> Result<Vec<MemoryEntity>> {
        let conn = self.db.connect()?;
        EntityRepository::get_by_ids(&conn, owner, ids).await
    }
    async fn list_recent_entities(&self, owner: &str, limit: usize) -> Result<Vec<MemoryEntity>> {
        let conn = self.db.connect()?;
        EntityRepository::list_recent(&conn, owner, limit).await
    }
    async fn list_entities_since(
        &self,
        owner: &str,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>> {
        let conn = self.db.connect()?;
        EntityRepository::list_since(&conn, owner, since, limit).await
    }
    async fn list_entities_by_degree(
        &self,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>> {
        let conn = self.db.connect()?;
        EntityRepository::list_by_degree(&conn, owner, limit).await
    }
    async fn list_entities_for_document(
        &self,
        owner: &str,
        document_id: &str,
        limit: usize,
    ) -> Result<Vec<MemoryEntity>> {
        let conn = self.db.connect()?;
        EntityRepository::list_for_document(&conn, owner, document_id, limit).await
    }
    async fn count_entities(&self, owner: &str) -> Result<u64> {
        let conn = self.db.connect()?;
        EntityRepository::count(&conn, owner).await
    }
    async fn list_owners(&self) -> Result<Vec<String>> {
        let conn = self.db.connect()?;
        EntityRepository::list_owners(&conn).await
    }
    async fn delete_conversation_memories(
        &self,
        owner: &str,
        conversation_id: &str,
    ) -> Result<u64> {
        let ids = {
            let conn = self.db.connect()?;
            EntityRepository::ids_for_conversation(&conn, owner, conversation_id).await?
        };
        self.delete_memories(owner, ids).await
    }
    async fn delete_document_memories(&self, owner: &str, document_id: &str) -> Result<u64> {
        let ids = {
            let conn = self.db.connect()?;
            EntityRepository::ids_for_document(&conn, owner, document_id).await?
        };
        self.delete_memories(owner, ids).await
    }
}

#[async_trait]
impl RelationshipStore for LibSqlBackend {
    async fn create_relationship(&self, rel: &MemoryRelationship) -> Result<bool> {
        let conn = self.db.connect()?;
        RelationshipRepository::create(&conn, rel).await
    }
    async fn list_relationships(
        &self,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<MemoryRelationship>> {
        let conn = self.db.connect()?;
        RelationshipRepository::list(&conn, owner, limit).await
    }
    async fn list_relationships_touching(
        &self,
        owner: &str,
        ids: &[String],
    ) -> Result<Vec<MemoryRelationship>> {
        let conn = self.db.connect()?;
        RelationshipRepository::list_touching(&conn, owner, ids).await
    }
}

#[async_trait]
impl DocumentStore for LibSqlBackend {
    async fn create_document(&self, doc: &Document) -> Result<()> {
        let conn = self.db.connect()?;
        if let Some(embedding) = &doc.embedding {
            DimensionRepository::ensure(&conn, &doc.owner, embedding.len()).await?;
        }
        DocumentRepository::create(&conn, doc).await
    }
    async fn get_document(&self, owner: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.db.connect()?;
        DocumentRepository::get(&conn, owner, id).await
    }
    async fn list_recent_documents(&self, owner: &str, limit: usize) -> Result<Vec<Document>> {
        let conn = self.db.connect()?;
        DocumentRepository::list_recent(&conn, owner, limit).await
    }
    async fn update_document_embedding(
        &self,
        owner: &str,
        id: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let conn = self.db.connect()?;
        DimensionRepository::ensure(&conn, owner, embedding.len()).await?;
        DocumentRepository::update_embedding(&conn, owner, id, embedding).await
    }
    async fn delete_document(&self, owner: &str, id: &str) -> Result<bool> {
        self.delete_document_memories(owner, id).await?;
        let conn = self.db.connect()?;
        DocumentRepository::delete(&conn, owner, id).await
    }
    async fn create_document_link(&self, link: &DocumentLink) -> Result<bool> {
        let conn = self.db.connect()?;
        DocumentRepository::create_link(&conn, link).await
    }
    async fn list_document_links(
        &self,
        owner: &str,
        document_id: &str,
    ) -> Result<Vec<DocumentLink>> {
        let conn = self.db.connect()?;
        DocumentRepository::list_links(&conn, owner, document_id).await
    }
}

#[async_trait]
impl NoteStore for LibSqlBackend {
    async fn create_note(&self, note: &Note) -> Result<()> {
        let conn = self.db.connect()?;
        if let Some(embedding) = &note.embedding {
            DimensionRepository::ensure(&conn, &note.owner, embedding.len()).await?;
        }
        NoteRepository::create(&conn, note).await
    }
    async fn get_note(&self, owner: &str, id: &str) -> Result<Option<Note>> {
        let conn = self.db.connect()?;
        NoteRepository::get(&conn, owner, id).await
    }
    async fn list_recent_notes(&self, owner: &str, limit: usize) -> Result<Vec<Note>> {
        let conn = self.db.connect()?;
        NoteRepository::list_recent(&conn, owner, limit).await
    }
    async fn list_notes_for_document(&self, owner: &str, document_id: &str) -> Result<Vec<Note>> {
        let conn = self.db.connect()?;
        NoteRepository::list_for_document(&conn, owner, document_id).await
    }
    async fn update_note_embedding(&self, owner: &str, id: &str, embedding: &[f32]) -> Result<()> {
        let conn = self.db.connect()?;
        DimensionRepository::ensure(&conn, owner, embedding.len()).await?;
        NoteRepository::update_embedding(&conn, owner, id, embedding).await
    }
    async fn create_note_relationship(&self, rel: &NoteRelationship) -> Result<bool> {
        let conn = self.db.connect()?;
        NoteRepository::create_relationship(&conn, rel).await
    }
    async fn list_note_relationships(
        &self,
        owner: &str,
        note_id: &str,
    ) -> Result<Vec<NoteRelationship>> {
        let conn = self.db.connect()?;
        NoteRepository::list_relationships(&conn, owner, note_id).await
    }
    async fn list_note_relationships_to(
        &self,
        owner: &str,
        related_type: RelatedType,
        related_id: &str,
    ) -> Result<Vec<NoteRelationship>> {
        let conn = self.db.connect()?;
        NoteRepository::list_relationships_to(&conn, owner, related_type, related_id).await
    }
}

#[async_trait]
impl ActionCacheStore for LibSqlBackend {
    async fn create_action_entry(&self, entry: &ActionCacheEntry) -> Result<bool> {
        let conn = self.db.connect()?;
        DimensionRepository::ensure(&conn, &entry.owner, entry.embedding.len()).await?;
        ActionCacheRepository::create(&conn, entry).await
    }
    async fn list_top_action_entries(
        &self,
        owner: &str,
        limit: usize,
    ) -> Result<Vec<ActionCacheEntry>> {
        let conn = self.db.connect()?;
        ActionCacheRepository::list_top(&conn, owner, limit).await
    }
    async fn record_action_hit(&self, owner: &str, id: &str) -> Result<Option<u32>> {
        let conn = self.db.connect()?;
        ActionCacheRepository::record_hit(&conn, owner, id).await
    }
    async fn delete_action_entries_unused_since(
        &self,
        owner: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<u64> {
        let conn = self.db.connect()?;
        ActionCacheRepository::delete_unused_since(&conn, owner, cutoff).await
    }
    async fn action_cache_stats(&self, owner: &str) -> Result<ActionCacheStats> {
        let conn = self.db.connect()?;
        ActionCacheRepository::stats(&conn, owner).await
    }
}

#[async_trait]
impl ProfileStore for LibSqlBackend {
    async fn upsert_interest_profile(&self, profile: &InterestProfile) -> Result<()> {
        let conn = self.db.connect()?;
        ProfileRepository::upsert(&conn, profile).await
    }
    async fn get_interest_profile(&self, owner: &str) -> Result<Option<InterestProfile>> {
        let conn = self.db.connect()?;
        ProfileRepository::get(&conn, owner).await
    }
}

#[async_trait]
impl DatabaseBackend for LibSqlBackend {
    async fn sync(&self) -> Result<()> {
        self.db.sync().await
    }

    async fn owner_dimensions(&self, owner: &str) -> Result<Option<usize>> {
        let conn = self.db.connect()?;
        DimensionRepository::get(&conn, owner).await
    }
}

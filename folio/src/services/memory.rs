use std::collections::HashMap;
use std::sync::Arc;

use validator::Validate;

use crate::config::SearchConfig;
use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingGateway;
use crate::error::{FolioError, Result};
use crate::intelligence::similarity::{find_similar, round_score};
use crate::intelligence::types::{ProposedEntity, ProposedRelationship};
use crate::intelligence::EntityExtractor;
use crate::models::{
    ConversationTurn, DocumentContext, EntityMetadata, EntityType, ExtractionReport, MemoryEntity,
    MemoryRelationship, MemorySearchHit, RelationshipType, SearchFilters,
};

/// Strength used when the reasoning service leaves it out.
const DEFAULT_STRENGTH: f32 = 0.5;

pub struct MemoryService {
    db: Arc<dyn DatabaseBackend>,
    embeddings: EmbeddingGateway,
    extractor: EntityExtractor,
    search: SearchConfig,
}

struct PendingEntity {
    reference: String,
    entity_type: EntityType,
    text: String,
    metadata: EntityMetadata,
}

impl MemoryService {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        embeddings: EmbeddingGateway,
        extractor: EntityExtractor,
        search: SearchConfig,
    ) -> Self {
        Self {
            db,
            embeddings,
            extractor,
            search,
        }
    }

    /// Extracts entities and relationships from a conversation and stores
    /// them. Per-item failures are counted in the report; only a dimension
    /// mismatch or a store failure is returned as an error.
    pub async fn extract_and_store(
        &self,
        owner: &str,
        conversation_id: Option<&str>,
        turns: &[ConversationTurn],
        document: Option<&DocumentContext>,
    ) -> Result<ExtractionReport> {
        if owner.trim().is_empty() {
            return Err(FolioError::Validation("Owner is required".to_string()));
        }
        if turns.is_empty() {
            return Err(FolioError::Validation(
                "At least one conversation turn is required".to_string(),
            ));
        }
        for turn in turns {
            turn.validate()
                .map_err(|e| FolioError::Validation(e.to_string()))?;
        }

        let proposal = self.extractor.propose(turns, document).await?;
        let mut report = ExtractionReport::default();
        if proposal.is_empty() {
            tracing::warn!(owner, turns = turns.len(), "Nothing extracted from conversation");
            return Ok(report);
        }

        let pending = self.accept_entities(proposal.entities, &mut report);
        let document_id = document.and_then(|d| d.document_id.as_deref());
        let references = self
            .store_entities(owner, conversation_id, document_id, pending, &mut report)
            .await?;
        self.store_relationships(owner, proposal.relationships, &references, &mut report)
            .await?;

        report.success = report.entities_created > 0;
        tracing::info!(
            owner,
            conversation_id,
            entities_created = report.entities_created,
            entities_failed = report.entities_failed,
            relationships_created = report.relationships_created,
            relationships_dropped = report.relationships_dropped,
            "Extraction stored"
        );
        Ok(report)
    }

    fn accept_entities(
        &self,
        proposed: Vec<ProposedEntity>,
        report: &mut ExtractionReport,
    ) -> Vec<PendingEntity> {
        let mut pending = Vec::with_capacity(proposed.len());
        for (index, entity) in proposed.into_iter().enumerate() {
            let text = entity.text.trim();
            let entity_type = match entity.entity_type.parse::<EntityType>() {
                Ok(entity_type) if !text.is_empty() => entity_type,
                Ok(_) => {
                    tracing::debug!(index, "Dropping proposed entity with empty text");
                    report.entities_failed += 1;
                    continue;
                }
                Err(e) => {
                    tracing::debug!(index, error = %e, "Dropping proposed entity");
                    report.entities_failed += 1;
                    continue;
                }
            };
            let reference = if entity.reference.trim().is_empty() {
                format!("#{index}")
            } else {
                entity.reference.trim().to_string()
            };
            pending.push(PendingEntity {
                reference,
                entity_type,
                text: text.to_string(),
                metadata: entity.typed_metadata(),
            });
        }
        pending
    }

    async fn store_entities(
        &self,
        owner: &str,
        conversation_id: Option<&str>,
        document_id: Option<&str>,
        pending: Vec<PendingEntity>,
        report: &mut ExtractionReport,
    ) -> Result<HashMap<String, String>> {
        let texts: Vec<String> = pending.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embeddings.embed_batch(&texts).await;

        let mut references = HashMap::new();
        for (item, embedding) in pending.into_iter().zip(embeddings) {
            let embedding = match embedding {
                Ok(embedding) => embedding,
                Err(e) => {
                    tracing::warn!(owner, error = %e, "Failed to embed extracted entity");
                    report.entities_failed += 1;
                    continue;
                }
            };

            let entity = MemoryEntity::new(owner, item.entity_type, &item.text, embedding)
                .with_conversation(conversation_id)
                .with_document(document_id)
                .with_metadata(item.metadata);
            if let Err(e) = entity.validate() {
                tracing::debug!(owner, error = %e, "Extracted entity failed validation");
                report.entities_failed += 1;
                continue;
            }

            match self.db.create_entity(&entity).await {
                Ok(()) => {
                    report.entities_created += 1;
                    report.entity_ids.push(entity.id.clone());
                    references.entry(item.reference).or_insert(entity.id);
                }
                Err(e @ FolioError::DimensionMismatch { .. }) => return Err(e),
                Err(e @ FolioError::Database(_)) => return Err(e),
                Err(e) => {
                    tracing::warn!(owner, error = %e, "Failed to store extracted entity");
                    report.entities_failed += 1;
                }
            }
        }
        Ok(references)
    }

    async fn store_relationships(
        &self,
        owner: &str,
        proposed: Vec<ProposedRelationship>,
        references: &HashMap<String, String>,
        report: &mut ExtractionReport,
    ) -> Result<()> {
        for rel in proposed {
            let endpoints = (
                references.get(rel.from.trim()),
                references.get(rel.to.trim()),
            );
            let (Some(from_id), Some(to_id)) = endpoints else {
                report.relationships_dropped += 1;
                continue;
            };
            let Ok(relationship_type) = rel.relationship_type.parse::<RelationshipType>() else {
                tracing::debug!(kind = %rel.relationship_type, "Dropping relationship of unknown type");
                report.relationships_dropped += 1;
                continue;
            };

            let strength = rel.strength.unwrap_or(DEFAULT_STRENGTH);
            let relationship =
                MemoryRelationship::new(owner, from_id, to_id, relationship_type, strength);
            if relationship.validate().is_err() {
                report.relationships_dropped += 1;
                continue;
            }

            if self.db.create_relationship(&relationship).await? {
                report.relationships_created += 1;
            } else {
                report.relationships_dropped += 1;
            }
        }
        Ok(())
    }

    /// Semantic search over the owner's recent entities.
    pub async fn search_memories(
        &self,
        owner: &str,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<Vec<MemorySearchHit>> {
        let threshold = filters.threshold.unwrap_or(self.search.default_threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(FolioError::Validation(format!(
                "Search threshold must be within [0, 1], got {threshold}"
            )));
        }
        let limit = filters.limit.unwrap_or(self.search.default_limit);

        let embedding = self.embeddings.embed(query).await?;
        let window = self.search.scan_window;
        let population = match filters.document_id.as_deref() {
            Some(document_id) => {
                self.db
                    .list_entities_for_document(owner, document_id, window)
                    .await?
            }
            None => self.db.list_recent_entities(owner, window).await?,
        };
        let candidates: Vec<MemoryEntity> = population
            .into_iter()
            .filter(|entity| filters.accepts(entity))
            .collect();

        let hits: Vec<MemorySearchHit> = find_similar(&embedding, &candidates, threshold, |e| {
            Some(e.embedding.as_slice())
        })?
        .into_iter()
        .take(limit)
        .map(|hit| MemorySearchHit {
            entity: hit.item.clone(),
            similarity: round_score(hit.similarity),
        })
        .collect();

        tracing::debug!(owner, scanned = candidates.len(), hits = hits.len(), "Memory search");
        Ok(hits)
    }

    pub async fn get_entity(&self, owner: &str, id: &str) -> Result<MemoryEntity> {
        self.db
            .get_entity(owner, id)
            .await?
            .ok_or_else(|| FolioError::NotFound(format!("Memory {id}")))
    }

    /// Most recent entities, oldest first.
    pub async fn list_entities(&self, owner: &str, limit: usize) -> Result<Vec<MemoryEntity>> {
        self.db.list_recent_entities(owner, limit).await
    }

    pub async fn delete_for_conversation(&self, owner: &str, conversation_id: &str) -> Result<u64> {
        self.db
            .delete_conversation_memories(owner, conversation_id)
            .await
    }

    pub async fn delete_for_document(&self, owner: &str, document_id: &str) -> Result<u64> {
        self.db.delete_document_memories(owner, document_id).await
    }
}

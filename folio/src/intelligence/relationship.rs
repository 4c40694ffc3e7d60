use std::collections::HashSet;
use std::sync::Arc;

use crate::config::DetectorConfig;
use crate::db::DatabaseBackend;
use crate::embeddings::EmbeddingGateway;
use crate::error::{FolioError, Result};
use crate::models::{
    Document, DocumentLink, MemoryEntity, MemoryRelationship, Note, NoteRelationship,
    NoteRelationshipType, RelatedType, RelationshipType,
};

use super::backfill::backfill_note_embeddings;
use super::similarity::{find_similar, round_score};
use super::types::{Band, DetectionReport, DetectionTarget};

/// Fixed similarity bands. Lower bounds are inclusive; anything below the
/// weak bound is discarded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelationshipBands {
    pub strong: f32,
    pub moderate: f32,
    pub weak: f32,
}

impl Default for RelationshipBands {
    fn default() -> Self {
        Self {
            strong: 0.90,
            moderate: 0.85,
            weak: 0.75,
        }
    }
}

impl From<&DetectorConfig> for RelationshipBands {
    fn from(config: &DetectorConfig) -> Self {
        Self {
            strong: config.strong_threshold,
            moderate: config.moderate_threshold,
            weak: config.weak_threshold,
        }
    }
}

impl RelationshipBands {
    pub fn classify(&self, similarity: f32) -> Option<Band> {
        if similarity >= self.strong {
            Some(Band::Strong)
        } else if similarity >= self.moderate {
            Some(Band::Moderate)
        } else if similarity >= self.weak {
            Some(Band::Weak)
        } else {
            None
        }
    }
}

impl Band {
    pub fn memory_label(&self) -> RelationshipType {
        match self {
            Band::Strong => RelationshipType::Supports,
            Band::Moderate => RelationshipType::Explains,
            Band::Weak => RelationshipType::RelatesTo,
        }
    }

    pub fn note_label(&self) -> NoteRelationshipType {
        match self {
            Band::Strong => NoteRelationshipType::References,
            Band::Moderate => NoteRelationshipType::Complements,
            Band::Weak => NoteRelationshipType::Illustrates,
        }
    }
}

/// Links a stored record to its most similar neighbours by embedding
/// similarity alone.
#[derive(Clone)]
pub struct RelationshipDetector {
    db: Arc<dyn DatabaseBackend>,
    embeddings: EmbeddingGateway,
    bands: RelationshipBands,
    candidate_window: usize,
}

impl RelationshipDetector {
    pub fn new(
        db: Arc<dyn DatabaseBackend>,
        embeddings: EmbeddingGateway,
        config: &DetectorConfig,
    ) -> Self {
        Self {
            db,
            embeddings,
            bands: RelationshipBands::from(config),
            candidate_window: config.candidate_window,
        }
    }

    pub fn bands(&self) -> &RelationshipBands {
        &self.bands
    }

    /// Creates edges from `target` to every similar record in the recent
    /// candidate windows. Fails with `NotFound` when the target is missing;
    /// returns an empty report when it cannot be embedded.
    pub async fn detect(&self, owner: &str, target: &DetectionTarget) -> Result<DetectionReport> {
        let report = match target {
            DetectionTarget::Memory(id) => {
                let entity = self
                    .db
                    .get_entity(owner, id)
                    .await?
                    .ok_or_else(|| FolioError::NotFound(format!("Memory {id}")))?;
                self.detect_for_memory(owner, &entity).await?
            }
            DetectionTarget::Note(id) => {
                let mut note = self
                    .db
                    .get_note(owner, id)
                    .await?
                    .ok_or_else(|| FolioError::NotFound(format!("Note {id}")))?;
                if !self.ensure_note_embedding(&mut note).await? {
                    return Ok(DetectionReport::default());
                }
                self.detect_for_note(owner, &note).await?
            }
            DetectionTarget::Document(id) => {
                let mut doc = self
                    .db
                    .get_document(owner, id)
                    .await?
                    .ok_or_else(|| FolioError::NotFound(format!("Document {id}")))?;
                if !self.ensure_document_embedding(&mut doc).await? {
                    return Ok(DetectionReport::default());
                }
                self.detect_for_document(owner, &doc).await?
            }
        };

        tracing::info!(
            owner,
            target = target.id(),
            scanned = report.scanned,
            created = report.created,
            strong = report.strong,
            moderate = report.moderate,
            weak = report.weak,
            "Relationship detection finished"
        );
        Ok(report)
    }

    async fn detect_for_memory(&self, owner: &str, entity: &MemoryEntity) -> Result<DetectionReport> {
        let mut report = DetectionReport::default();

        let linked: HashSet<String> = self
            .db
            .list_relationships_touching(owner, std::slice::from_ref(&entity.id))
            .await?
            .iter()
            .filter_map(|rel| rel.other_end(&entity.id).map(str::to_string))
            .collect();

        let candidates: Vec<MemoryEntity> = self
            .db
            .list_recent_entities(owner, self.candidate_window)
            .await?
            .into_iter()
            .filter(|c| c.id != entity.id && !linked.contains(&c.id))
            .collect();
        report.scanned = candidates.len() as u32;

        let hits = find_similar(&entity.embedding, &candidates, self.bands.weak, |c| {
            Some(c.embedding.as_slice())
        })?;
        for hit in hits {
            let Some(band) = self.bands.classify(round_score(hit.similarity)) else {
                continue;
            };
            let rel = MemoryRelationship::new(
                owner,
                &entity.id,
                &hit.item.id,
                band.memory_label(),
                hit.similarity,
            )
            .detected();
            if self.db.create_relationship(&rel).await? {
                report.record(band);
            }
        }

        Ok(report)
    }

    async fn detect_for_note(&self, owner: &str, note: &Note) -> Result<DetectionReport> {
        let mut report = DetectionReport::default();
        let Some(source) = note.embedding.as_deref() else {
            return Ok(report);
        };

        let documents = self
            .db
            .list_recent_documents(owner, self.candidate_window)
            .await?;
        let memories = self
            .db
            .list_recent_entities(owner, self.candidate_window)
            .await?;
        let mut notes: Vec<Note> = self
            .db
            .list_recent_notes(owner, self.candidate_window)
            .await?
            .into_iter()
            .filter(|n| n.id != note.id)
            .collect();
        backfill_note_embeddings(self.db.as_ref(), &self.embeddings, &mut notes).await;

        report.scanned = (documents.len() + memories.len() + notes.len()) as u32;

        let mut proposals: Vec<(RelatedType, String, f32)> = Vec::new();
        for hit in find_similar(source, &documents, self.bands.weak, |d: &Document| {
            d.embedding.as_deref()
        })? {
            proposals.push((RelatedType::Document, hit.item.id.clone(), hit.similarity));
        }
        for hit in find_similar(source, &memories, self.bands.weak, |m: &MemoryEntity| {
            Some(m.embedding.as_slice())
        })? {
            proposals.push((RelatedType::Memory, hit.item.id.clone(), hit.similarity));
        }
        for hit in find_similar(source, &notes, self.bands.weak, |n: &Note| {
            n.embedding.as_deref()
        })? {
            proposals.push((RelatedType::Note, hit.item.id.clone(), hit.similarity));
        }

        for (related_type, related_id, similarity) in proposals {
            let Some(band) = self.bands.classify(round_score(similarity)) else {
                continue;
            };
            let rel = NoteRelationship::detected(
                owner,
                &note.id,
                related_type,
                &related_id,
                band.note_label(),
                similarity,
            );
            if self.db.create_note_relationship(&rel).await? {
                report.record(band);
            }
        }

        Ok(report)
    }

    async fn detect_for_document(&self, owner: &str, doc: &Document) -> Result<DetectionReport> {
        let mut report = DetectionReport::default();
        let Some(source) = doc.embedding.as_deref() else {
            return Ok(report);
        };

        let documents: Vec<Document> = self
            .db
            .list_recent_documents(owner, self.candidate_window)
            .await?
            .into_iter()
            .filter(|d| d.id != doc.id)
            .collect();
        let mut notes = self
            .db
            .list_recent_notes(owner, self.candidate_window)
            .await?;
        backfill_note_embeddings(self.db.as_ref(), &self.embeddings, &mut notes).await;

        report.scanned = (documents.len() + notes.len()) as u32;

        for hit in find_similar(source, &documents, self.bands.weak, |d: &Document| {
            d.embedding.as_deref()
        })? {
            let Some(band) = self.bands.classify(round_score(hit.similarity)) else {
                continue;
            };
            let link = DocumentLink::new(
                owner,
                &doc.id,
                &hit.item.id,
                Some(round_score(hit.similarity)),
            );
            if self.db.create_document_link(&link).await? {
                report.record(band);
            }
        }

        for hit in find_similar(source, &notes, self.bands.weak, |n: &Note| {
            n.embedding.as_deref()
        })? {
            let Some(band) = self.bands.classify(round_score(hit.similarity)) else {
                continue;
            };
            let rel = NoteRelationship::detected(
                owner,
                &hit.item.id,
                RelatedType::Document,
                &doc.id,
                band.note_label(),
                hit.similarity,
            );
            if self.db.create_note_relationship(&rel).await? {
                report.record(band);
            }
        }

        Ok(report)
    }

    /// Embeds and stores the note's vector when missing. False when the
    /// provider is unavailable.
    async fn ensure_note_embedding(&self, note: &mut Note) -> Result<bool> {
        if note.embedding.is_some() {
            return Ok(true);
        }
        match self.embeddings.embed(&note.embedding_text()).await {
            Ok(vector) => {
                self.db
                    .update_note_embedding(&note.owner, &note.id, &vector)
                    .await?;
                note.embedding = Some(vector);
                Ok(true)
            }
            Err(e) if e.is_degradable() => {
                tracing::warn!(note_id = %note.id, error = %e, "Skipping detection, note could not be embedded");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn ensure_document_embedding(&self, doc: &mut Document) -> Result<bool> {
        if doc.embedding.is_some() {
            return Ok(true);
        }
        match self.embeddings.embed(&doc.embedding_text()).await {
            Ok(vector) => {
                self.db
                    .update_document_embedding(&doc.owner, &doc.id, &vector)
                    .await?;
                doc.embedding = Some(vector);
                Ok(true)
            }
            Err(e) if e.is_degradable() => {
                tracing::warn!(document_id = %doc.id, error = %e, "Skipping detection, document could not be embedded");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

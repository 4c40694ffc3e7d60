use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::{text_enum, EntityMetadata};
use crate::error::{FolioError, Result};
use crate::intelligence::similarity::round_score;

/// Longest entity text accepted for storage.
pub const MAX_ENTITY_TEXT_CHARS: usize = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    #[default]
    Concept,
    Question,
    Insight,
    Reference,
    Action,
    Document,
}

text_enum!(EntityType {
    Concept => "concept",
    Question => "question",
    Insight => "insight",
    Reference => "reference",
    Action => "action",
    Document => "document",
});

impl EntityType {
    /// Metadata keys conventionally attached to each entity type. Not
    /// enforced; unknown keys are stored as given.
    pub fn documented_metadata_keys(&self) -> &'static [&'static str] {
        match self {
            EntityType::Concept => &["aliases", "domain"],
            EntityType::Question => &["answered", "answer_entity_id"],
            EntityType::Insight => &["confidence"],
            EntityType::Reference => &["source", "page", "url"],
            EntityType::Action => &["status", "due"],
            EntityType::Document => &["title"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    RelatesTo,
    Contradicts,
    Supports,
    Cites,
    Explains,
}

text_enum!(RelationshipType {
    RelatesTo => "relates_to",
    Contradicts => "contradicts",
    Supports => "supports",
    Cites => "cites",
    Explains => "explains",
});

/// A stored unit of extracted knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntity {
    pub id: String,
    pub owner: String,
    pub conversation_id: Option<String>,
    pub document_id: Option<String>,
    pub entity_type: EntityType,
    pub text: String,
    pub metadata: EntityMetadata,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    /// Denormalized count of incident relationships.
    pub degree: u32,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntity {
    pub fn new(owner: &str, entity_type: EntityType, text: &str, embedding: Vec<f32>) -> Self {
        Self {
            id: nanoid::nanoid!(),
            owner: owner.to_string(),
            conversation_id: None,
            document_id: None,
            entity_type,
            text: text.trim().to_string(),
            metadata: EntityMetadata::new(),
            embedding,
            degree: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_conversation(mut self, conversation_id: Option<&str>) -> Self {
        self.conversation_id = conversation_id.map(str::to_string);
        self
    }

    pub fn with_document(mut self, document_id: Option<&str>) -> Self {
        self.document_id = document_id.map(str::to_string);
        self
    }

    pub fn with_metadata(mut self, metadata: EntityMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.owner.trim().is_empty() {
            return Err(FolioError::Validation("Entity owner is required".to_string()));
        }
        if self.text.is_empty() {
            return Err(FolioError::Validation("Entity text is empty".to_string()));
        }
        if self.text.chars().count() > MAX_ENTITY_TEXT_CHARS {
            return Err(FolioError::Validation(format!(
                "Entity text exceeds {MAX_ENTITY_TEXT_CHARS} characters"
            )));
        }
        if self.embedding.is_empty() {
            return Err(FolioError::Validation(
                "Entity has no embedding".to_string(),
            ));
        }
        Ok(())
    }
}

/// Directed, typed, scored edge between two entities of one owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryRelationship {
    pub id: String,
    pub owner: String,
    pub from_id: String,
    pub to_id: String,
    pub relationship_type: RelationshipType,
    pub strength: f32,
    pub auto_detected: bool,
    pub created_at: DateTime<Utc>,
}

impl MemoryRelationship {
    pub fn new(
        owner: &str,
        from_id: &str,
        to_id: &str,
        relationship_type: RelationshipType,
        strength: f32,
    ) -> Self {
        Self {
            id: nanoid::nanoid!(),
            owner: owner.to_string(),
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            relationship_type,
            strength: round_score(strength),
            auto_detected: false,
            created_at: Utc::now(),
        }
    }

    pub fn detected(mut self) -> Self {
        self.auto_detected = true;
        self
    }

    /// The endpoint opposite `id`, treating the edge as undirected.
    pub fn other_end(&self, id: &str) -> Option<&str> {
        if self.from_id == id {
            Some(&self.to_id)
        } else if self.to_id == id {
            Some(&self.from_id)
        } else {
            None
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.from_id == self.to_id {
            return Err(FolioError::Validation(
                "Relationship endpoints must differ".to_string(),
            ));
        }
        Ok(())
    }
}

/// Narrowing options for memory search.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchFilters {
    pub entity_types: Vec<EntityType>,
    pub conversation_id: Option<String>,
    pub document_id: Option<String>,
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
}

impl SearchFilters {
    pub fn accepts(&self, entity: &MemoryEntity) -> bool {
        if !self.entity_types.is_empty() && !self.entity_types.contains(&entity.entity_type) {
            return false;
        }
        if let Some(conversation_id) = &self.conversation_id {
            if entity.conversation_id.as_ref() != Some(conversation_id) {
                return false;
            }
        }
        if let Some(document_id) = &self.document_id {
            if entity.document_id.as_ref() != Some(document_id) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemorySearchHit {
    pub entity: MemoryEntity,
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_text_forms() {
        assert_eq!(EntityType::Insight.to_string(), "insight");
        assert_eq!("Reference".parse::<EntityType>().unwrap(), EntityType::Reference);
        assert!("opinion".parse::<EntityType>().is_err());
        assert_eq!(EntityType::ALL.len(), 6);
    }

    #[test]
    fn relationship_type_serde_matches_text() {
        for kind in RelationshipType::ALL {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, kind.as_str());
        }
        assert_eq!(
            "relates_to".parse::<RelationshipType>().unwrap(),
            RelationshipType::RelatesTo
        );
    }

    #[test]
    fn unknown_relationship_text_names_the_type() {
        let err = " Rhymes_With ".parse::<RelationshipType>().unwrap_err();
        assert_eq!(err, "Unknown RelationshipType:  Rhymes_With ");
        assert_eq!(" SUPPORTS ".parse::<RelationshipType>(), Ok(RelationshipType::Supports));
    }

    #[test]
    fn relationship_strength_is_rounded() {
        let rel = MemoryRelationship::new("u1", "a", "b", RelationshipType::Supports, 0.912_345);
        assert_eq!(rel.strength, 0.9123);
        assert_eq!(rel.other_end("a"), Some("b"));
        assert_eq!(rel.other_end("b"), Some("a"));
        assert_eq!(rel.other_end("c"), None);
    }

    #[test]
    fn self_loops_are_invalid() {
        let rel = MemoryRelationship::new("u1", "a", "a", RelationshipType::RelatesTo, 0.8);
        assert!(rel.validate().is_err());
    }

    #[test]
    fn entity_validation() {
        let ok = MemoryEntity::new("u1", EntityType::Concept, "  Entropy  ", vec![1.0]);
        assert_eq!(ok.text, "Entropy");
        assert!(ok.validate().is_ok());

        let no_embedding = MemoryEntity::new("u1", EntityType::Concept, "Entropy", vec![]);
        assert!(no_embedding.validate().is_err());

        let blank = MemoryEntity::new("u1", EntityType::Concept, "   ", vec![1.0]);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn filters_match_type_and_links() {
        let entity = MemoryEntity::new("u1", EntityType::Question, "Why?", vec![1.0])
            .with_conversation(Some("c1"));

        let mut filters = SearchFilters::default();
        assert!(filters.accepts(&entity));

        filters.entity_types = vec![EntityType::Concept];
        assert!(!filters.accepts(&entity));

        filters.entity_types = vec![EntityType::Question];
        filters.conversation_id = Some("c2".into());
        assert!(!filters.accepts(&entity));

        filters.conversation_id = Some("c1".into());
        assert!(filters.accepts(&entity));
    }
}

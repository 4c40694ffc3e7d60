use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::text_enum;
use crate::intelligence::similarity::round_score;

/// A user note or highlight. Notes are not always embedded up front.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub owner: String,
    pub document_id: Option<String>,
    pub content: String,
    pub highlight: Option<String>,
    #[serde(skip_serializing, default)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Note {
    pub fn new(owner: &str, document_id: Option<&str>, content: &str) -> Self {
        Self {
            id: nanoid::nanoid!(),
            owner: owner.to_string(),
            document_id: document_id.map(str::to_string),
            content: content.trim().to_string(),
            highlight: None,
            embedding: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_highlight(mut self, highlight: &str) -> Self {
        self.highlight = Some(highlight.trim().to_string());
        self
    }

    /// Highlighted passage followed by the note body.
    pub fn embedding_text(&self) -> String {
        match self.highlight.as_deref().filter(|h| !h.is_empty()) {
            Some(highlight) if !self.content.is_empty() => {
                format!("{highlight}\n\n{}", self.content)
            }
            Some(highlight) => highlight.to_string(),
            None => self.content.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelatedType {
    Document,
    Note,
    Memory,
}

text_enum!(RelatedType {
    Document => "document",
    Note => "note",
    Memory => "memory",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteRelationshipType {
    References,
    Illustrates,
    Contradicts,
    Complements,
    Exemplifies,
    Defines,
}

text_enum!(NoteRelationshipType {
    References => "references",
    Illustrates => "illustrates",
    Contradicts => "contradicts",
    Complements => "complements",
    Exemplifies => "exemplifies",
    Defines => "defines",
});

/// Edge from a note to a document, another note or a memory entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteRelationship {
    pub id: String,
    pub owner: String,
    pub note_id: String,
    pub related_type: RelatedType,
    pub related_id: String,
    pub relationship_type: NoteRelationshipType,
    /// Present on auto-detected links; manual links may omit it.
    pub similarity_score: Option<f32>,
    pub auto_detected: bool,
    pub created_at: DateTime<Utc>,
}

impl NoteRelationship {
    pub fn manual(
        owner: &str,
        note_id: &str,
        related_type: RelatedType,
        related_id: &str,
        relationship_type: NoteRelationshipType,
    ) -> Self {
        Self {
            id: nanoid::nanoid!(),
            owner: owner.to_string(),
            note_id: note_id.to_string(),
            related_type,
            related_id: related_id.to_string(),
            relationship_type,
            similarity_score: None,
            auto_detected: false,
            created_at: Utc::now(),
        }
    }

    pub fn detected(
        owner: &str,
        note_id: &str,
        related_type: RelatedType,
        related_id: &str,
        relationship_type: NoteRelationshipType,
        similarity: f32,
    ) -> Self {
        Self {
            similarity_score: Some(round_score(similarity)),
            auto_detected: true,
            ..Self::manual(owner, note_id, related_type, related_id, relationship_type)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNoteRequest {
    pub document_id: Option<String>,
    #[validate(length(min = 1, max = 20_000))]
    pub content: String,
    #[validate(length(max = 20_000))]
    pub highlight: Option<String>,
}

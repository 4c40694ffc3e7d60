use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// A document in the reader's library. File storage and parsing live
/// elsewhere; only what the graph needs is kept here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(skip_serializing, default)]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(owner: &str, title: &str, description: Option<&str>) -> Self {
        Self {
            id: nanoid::nanoid!(),
            owner: owner.to_string(),
            title: title.trim().to_string(),
            description: description.map(|d| d.trim().to_string()),
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// Text used to embed the document: title plus description.
    pub fn embedding_text(&self) -> String {
        match self.description.as_deref().filter(|d| !d.is_empty()) {
            Some(description) => format!("{}\n\n{}", self.title, description),
            None => self.title.clone(),
        }
    }
}

/// Explicit, possibly auto-detected, link between two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLink {
    pub owner: String,
    pub from_document_id: String,
    pub to_document_id: String,
    pub similarity: Option<f32>,
    pub auto_detected: bool,
    pub created_at: DateTime<Utc>,
}

impl DocumentLink {
    pub fn new(owner: &str, from: &str, to: &str, similarity: Option<f32>) -> Self {
        Self {
            owner: owner.to_string(),
            from_document_id: from.to_string(),
            to_document_id: to.to_string(),
            similarity,
            auto_detected: similarity.is_some(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    #[validate(length(min = 1, max = 500))]
    pub title: String,
    #[validate(length(max = 10_000))]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_text_joins_title_and_description() {
        let doc = Document::new("u1", "Thermodynamics", Some("Heat and work"));
        assert_eq!(doc.embedding_text(), "Thermodynamics\n\nHeat and work");

        let bare = Document::new("u1", "Optics", None);
        assert_eq!(bare.embedding_text(), "Optics");
    }

    #[test]
    fn links_with_similarity_are_auto_detected() {
        assert!(DocumentLink::new("u1", "a", "b", Some(0.9)).auto_detected);
        assert!(!DocumentLink::new("u1", "a", "b", None).auto_detected);
    }

    #[test]
    fn create_request_validates_title() {
        let request = CreateDocumentRequest {
            title: String::new(),
            description: None,
        };
        assert!(request.validate().is_err());
    }
}

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::text_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

text_enum!(TurnRole {
    User => "user",
    Assistant => "assistant",
    System => "system",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ConversationTurn {
    pub role: TurnRole,
    #[validate(length(min = 1, max = 50_000))]
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: &str) -> Self {
        Self {
            role: TurnRole::User,
            content: content.to_string(),
        }
    }

    pub fn assistant(content: &str) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.to_string(),
        }
    }
}

/// What the reader had open while the conversation happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentContext {
    pub document_id: Option<String>,
    pub title: Option<String>,
    /// Passage currently on screen or selected.
    pub excerpt: Option<String>,
}

/// Outcome of one extraction pass. Partial failures are counted here rather
/// than raised as errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    /// False only when no entity at all could be persisted.
    pub success: bool,
    pub entities_created: u32,
    pub relationships_created: u32,
    pub entities_failed: u32,
    pub relationships_dropped: u32,
    pub entity_ids: Vec<String>,
}

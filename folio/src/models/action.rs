//! Reader actions: the closed set of commands natural-language requests are
//! translated into, plus the cache records and resolution results built
//! around them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::text_enum;
use crate::error::{FolioError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    Document,
    #[default]
    Library,
    Memories,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Pdf,
    Json,
    Csv,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum ReaderAction {
    Highlight {
        text: String,
        #[serde(default, rename = "documentId", skip_serializing_if = "Option::is_none")]
        document_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        color: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
    },
    CreateNote {
        content: String,
        #[serde(default, rename = "documentId", skip_serializing_if = "Option::is_none")]
        document_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        highlight: Option<String>,
    },
    Search {
        query: String,
        #[serde(default)]
        scope: SearchScope,
    },
    Export {
        #[serde(default)]
        format: ExportFormat,
        #[serde(default = "default_true", rename = "includeNotes")]
        include_notes: bool,
    },
    Tts {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        voice: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rate: Option<f32>,
    },
    Question {
        question: String,
        #[serde(default, rename = "documentId", skip_serializing_if = "Option::is_none")]
        document_id: Option<String>,
    },
    Navigate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        section: Option<String>,
        #[serde(default, rename = "documentId", skip_serializing_if = "Option::is_none")]
        document_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Highlight,
    CreateNote,
    Search,
    Export,
    Tts,
    Question,
    Navigate,
}

text_enum!(ActionType {
    Highlight => "highlight",
    CreateNote => "create_note",
    Search => "search",
    Export => "export",
    Tts => "tts",
    Question => "question",
    Navigate => "navigate",
});

const TTS_RATE_RANGE: std::ops::RangeInclusive<f32> = 0.25..=4.0;

impl ReaderAction {
    pub fn action_type(&self) -> ActionType {
        match self {
            ReaderAction::Highlight { .. } => ActionType::Highlight,
            ReaderAction::CreateNote { .. } => ActionType::CreateNote,
            ReaderAction::Search { .. } => ActionType::Search,
            ReaderAction::Export { .. } => ActionType::Export,
            ReaderAction::Tts { .. } => ActionType::Tts,
            ReaderAction::Question { .. } => ActionType::Question,
            ReaderAction::Navigate { .. } => ActionType::Navigate,
        }
    }

    /// Field-level checks serde cannot express.
    pub fn validate(&self) -> Result<()> {
        match self {
            ReaderAction::Highlight { text, .. } => require("highlight.text", text),
            ReaderAction::CreateNote { content, .. } => require("create_note.content", content),
            ReaderAction::Search { query, .. } => require("search.query", query),
            ReaderAction::Export { .. } => Ok(()),
            ReaderAction::Tts { rate, text, .. } => {
                if let Some(text) = text {
                    require("tts.text", text)?;
                }
                match rate {
                    Some(rate) if !TTS_RATE_RANGE.contains(rate) => Err(FolioError::InvalidAction(
                        format!("tts.rate {rate} outside 0.25..=4.0"),
                    )),
                    _ => Ok(()),
                }
            }
            ReaderAction::Question { question, .. } => require("question.question", question),
            ReaderAction::Navigate { page, section, .. } => {
                let has_section = section.as_deref().is_some_and(|s| !s.trim().is_empty());
                match page {
                    Some(0) => Err(FolioError::InvalidAction(
                        "navigate.page is 1-based".to_string(),
                    )),
                    None if !has_section => Err(FolioError::InvalidAction(
                        "navigate needs a page or a section".to_string(),
                    )),
                    _ => Ok(()),
                }
            }
        }
    }

    /// Parse and validate untrusted JSON (reasoning output or a stored row).
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let action: ReaderAction = serde_json::from_value(value)
            .map_err(|e| FolioError::InvalidAction(format!("Unrecognized action shape: {e}")))?;
        action.validate()?;
        Ok(action)
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(FolioError::InvalidAction(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

/// A prior NL→action resolution kept for semantic reuse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCacheEntry {
    pub id: String,
    pub owner: String,
    pub natural_language_text: String,
    /// SHA-256 of the normalized text; unique per owner.
    pub query_hash: String,
    #[serde(skip_serializing, default)]
    pub embedding: Vec<f32>,
    pub resolved_action: ReaderAction,
    pub action_type: ActionType,
    pub hit_count: u32,
    pub last_used_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ActionCacheEntry {
    pub fn new(
        owner: &str,
        text: &str,
        query_hash: String,
        embedding: Vec<f32>,
        action: ReaderAction,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: nanoid::nanoid!(),
            owner: owner.to_string(),
            natural_language_text: text.to_string(),
            query_hash,
            embedding,
            action_type: action.action_type(),
            resolved_action: action,
            hit_count: 0,
            last_used_at: now,
            created_at: now,
        }
    }
}

/// Terminal state reached by one cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionOutcome {
    CacheHit,
    /// Miss, translated and stored.
    Translated,
    /// Translated without touching the cache because the query could not be embedded.
    TranslatedUncached,
    InvalidAction,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResolution {
    pub hit: bool,
    pub from_cache: bool,
    pub outcome: ResolutionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ReaderAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_type: Option<ActionType>,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ActionResolution {
    pub fn cache_hit(entry: &ActionCacheEntry, similarity: f32) -> Self {
        Self {
            hit: true,
            from_cache: true,
            outcome: ResolutionOutcome::CacheHit,
            action_type: Some(entry.action_type),
            action: Some(entry.resolved_action.clone()),
            confidence: similarity,
            entry_id: Some(entry.id.clone()),
            failure: None,
        }
    }

    pub fn translated(action: ReaderAction, confidence: f32, entry_id: Option<String>) -> Self {
        let outcome = if entry_id.is_some() {
            ResolutionOutcome::Translated
        } else {
            ResolutionOutcome::TranslatedUncached
        };
        Self {
            hit: true,
            from_cache: false,
            outcome,
            action_type: Some(action.action_type()),
            action: Some(action),
            confidence,
            entry_id,
            failure: None,
        }
    }

    pub fn failed(outcome: ResolutionOutcome, reason: impl Into<String>) -> Self {
        Self {
            hit: false,
            from_cache: false,
            outcome,
            action: None,
            action_type: None,
            confidence: 0.0,
            entry_id: None,
            failure: Some(reason.into()),
        }
    }
}

/// Aggregate counts for an owner's cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCacheStats {
    pub entries: u64,
    pub total_hits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn action_type_round_trips_through_text() {
        for kind in ActionType::ALL {
            assert_eq!(kind.as_str().parse::<ActionType>(), Ok(*kind));
        }
        assert!("teleport".parse::<ActionType>().is_err());
    }

    #[test]
    fn parses_tagged_variants() {
        let action = ReaderAction::from_value(json!({
            "type": "highlight",
            "text": "entropy always increases",
            "color": "yellow"
        }))
        .unwrap();
        assert_eq!(action.action_type(), ActionType::Highlight);

        let action = ReaderAction::from_value(json!({"type": "navigate", "page": 42})).unwrap();
        assert_eq!(
            action,
            ReaderAction::Navigate {
                page: Some(42),
                section: None,
                document_id: None
            }
        );
    }

    #[test]
    fn export_defaults_apply() {
        let action = ReaderAction::from_value(json!({"type": "export"})).unwrap();
        assert_eq!(
            action,
            ReaderAction::Export {
                format: ExportFormat::Markdown,
                include_notes: true
            }
        );
    }

    #[test]
    fn unknown_type_is_invalid_action() {
        let err = ReaderAction::from_value(json!({"type": "delete_library"})).unwrap_err();
        assert!(matches!(err, FolioError::InvalidAction(_)));
    }

    #[test]
    fn missing_required_field_is_invalid_action() {
        let err = ReaderAction::from_value(json!({"type": "search"})).unwrap_err();
        assert!(matches!(err, FolioError::InvalidAction(_)));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err =
            ReaderAction::from_value(json!({"type": "search", "query": "x", "sql": "DROP"}))
                .unwrap_err();
        assert!(matches!(err, FolioError::InvalidAction(_)));
    }

    #[test]
    fn semantic_checks() {
        let blank = ReaderAction::from_value(json!({"type": "question", "question": "  "}));
        assert!(blank.is_err());

        let fast = ReaderAction::from_value(json!({"type": "tts", "rate": 9.0}));
        assert!(fast.is_err());

        let nowhere = ReaderAction::from_value(json!({"type": "navigate"}));
        assert!(nowhere.is_err());

        let page_zero = ReaderAction::from_value(json!({"type": "navigate", "page": 0}));
        assert!(page_zero.is_err());
    }

    #[test]
    fn serializes_with_type_tag() {
        let action = ReaderAction::CreateNote {
            content: "remember this".into(),
            document_id: Some("d1".into()),
            highlight: None,
        };
        assert_eq!(
            serde_json::to_value(&action).unwrap(),
            json!({"type": "create_note", "content": "remember this", "documentId": "d1"})
        );
    }

    #[test]
    fn failed_resolution_shape() {
        let resolution = ActionResolution::failed(ResolutionOutcome::InvalidAction, "bad");
        assert!(!resolution.hit);
        assert!(!resolution.from_cache);
        assert!(resolution.action.is_none());
    }
}

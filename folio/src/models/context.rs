use serde::{Deserialize, Serialize};

use super::NodeKind;
use crate::config::ContextConfig;

/// Per-kind caps and a total character budget for one bundle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextLimits {
    pub max_memories: usize,
    pub max_notes: usize,
    pub max_documents: usize,
    pub max_chars: usize,
    /// Expand top memories one hop through the memory graph.
    pub include_related: bool,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_memories: 8,
            max_notes: 5,
            max_documents: 3,
            max_chars: 6_000,
            include_related: true,
        }
    }
}

impl From<&ContextConfig> for ContextLimits {
    fn from(config: &ContextConfig) -> Self {
        Self {
            max_memories: config.max_memories,
            max_notes: config.max_notes,
            max_documents: config.max_documents,
            max_chars: config.max_chars,
            include_related: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextItem {
    pub id: String,
    pub kind: NodeKind,
    pub text: String,
    pub score: f32,
}

/// Bounded context assembled for a downstream prompt.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub query: String,
    pub documents: Vec<ContextItem>,
    pub notes: Vec<ContextItem>,
    pub memories: Vec<ContextItem>,
    /// Graph neighbours of the top memories.
    pub related: Vec<ContextItem>,
    pub total_chars: usize,
    /// Items were dropped or shortened to fit the budget.
    pub truncated: bool,
    /// Built without semantic search because the query could not be embedded.
    pub degraded: bool,
}

impl ContextBundle {
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
            && self.notes.is_empty()
            && self.memories.is_empty()
            && self.related.is_empty()
    }

    /// Plain-text rendering for prompts. Empty sections are omitted.
    pub fn render(&self) -> String {
        let sections: [(&str, &[ContextItem]); 4] = [
            ("Documents", &self.documents),
            ("Notes", &self.notes),
            ("Memories", &self.memories),
            ("Related", &self.related),
        ];

        let mut out = String::new();
        for (title, items) in sections {
            if items.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("## {title}\n"));
            for item in items {
                out.push_str(&format!("- {}\n", item.text));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str, kind: NodeKind, text: &str) -> ContextItem {
        ContextItem {
            id: id.to_string(),
            kind,
            text: text.to_string(),
            score: 0.9,
        }
    }

    #[test]
    fn render_skips_empty_sections() {
        let bundle = ContextBundle {
            query: "q".into(),
            memories: vec![item("m1", NodeKind::Memory, "Entropy is disorder")],
            notes: vec![item("n1", NodeKind::Note, "See chapter 4")],
            ..Default::default()
        };

        assert_eq!(
            bundle.render(),
            "## Notes\n- See chapter 4\n\n## Memories\n- Entropy is disorder\n"
        );
    }

    #[test]
    fn limits_deserialize_with_defaults() {
        let limits: ContextLimits = serde_json::from_str(r#"{"maxMemories": 2}"#).unwrap();
        assert_eq!(limits.max_memories, 2);
        assert_eq!(limits.max_notes, 5);
        assert!(limits.include_related);
    }
}

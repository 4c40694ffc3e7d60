//! Prompt templates for the LLM-backed features.
//!
//! Templates use plain `format!()` interpolation so a missing variable is a
//! compile-time error.

use crate::models::{ConversationTurn, DocumentContext};

/// System prompt shared by every JSON-producing call.
pub const JSON_SYSTEM_PROMPT: &str =
    "You are a precise assistant for a reading application. Respond with valid JSON only.";

/// Generate a prompt that extracts knowledge entities and relations from a
/// reading conversation.
///
/// The response is a JSON object with `entities` (each carrying a local
/// `ref` the relationships point at) and `relationships`.
///
/// # Example
/// ```
/// use folio::llm::prompts::entity_extraction_prompt;
/// use folio::models::ConversationTurn;
///
/// let turns = vec![ConversationTurn::user("What is entropy?")];
/// let prompt = entity_extraction_prompt(&turns, None);
/// assert!(prompt.contains("What is entropy?"));
/// ```
pub fn entity_extraction_prompt(
    turns: &[ConversationTurn],
    document: Option<&DocumentContext>,
) -> String {
    let transcript = turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n");

    let reading = match document {
        Some(ctx) => {
            let mut lines = Vec::new();
            if let Some(title) = ctx.title.as_deref() {
                lines.push(format!("Title: {title}"));
            }
            if let Some(excerpt) = ctx.excerpt.as_deref() {
                lines.push(format!("Excerpt: {excerpt}"));
            }
            if lines.is_empty() {
                String::new()
            } else {
                format!("\nThe reader currently has this document open:\n{}\n", lines.join("\n"))
            }
        }
        None => String::new(),
    };

    format!(
        r#"Extract the knowledge worth remembering from the reading conversation below.
{reading}
Entity types:
- concept: an idea, term or topic discussed
- question: something the reader asked or wondered
- insight: a conclusion or realisation reached
- reference: a cited source, page, chapter or link
- action: something the reader intends to do
- document: a book, paper or article mentioned by name

Relationship types: relates_to, contradicts, supports, cites, explains.
Relationships connect entities by their "ref" value. "strength" is between 0.0 and 1.0.
Metadata is optional; use short strings, numbers, booleans or lists of strings.

Conversation:
{transcript}

Respond with valid JSON only. Example format:
{{
  "entities": [
    {{"ref": "e1", "type": "concept", "text": "Entropy", "metadata": {{"domain": "physics"}}}},
    {{"ref": "e2", "type": "insight", "text": "Entropy never decreases in an isolated system"}}
  ],
  "relationships": [
    {{"from": "e2", "to": "e1", "type": "explains", "strength": 0.8}}
  ]
}}"#
    )
}

/// Generate a prompt that maps a natural-language reader request onto one
/// structured action.
pub fn action_translation_prompt(query: &str) -> String {
    format!(
        r#"Translate the reader's request into exactly one action object.

Allowed actions (the "type" field selects one):
- {{"type": "highlight", "text": string, "documentId"?: string, "color"?: string, "page"?: integer}}
- {{"type": "create_note", "content": string, "documentId"?: string, "highlight"?: string}}
- {{"type": "search", "query": string, "scope"?: "document" | "library" | "memories"}}
- {{"type": "export", "format"?: "markdown" | "pdf" | "json" | "csv", "includeNotes"?: boolean}}
- {{"type": "tts", "text": string, "voice"?: string, "rate"?: number between 0.25 and 4.0}}
- {{"type": "question", "question": string, "documentId"?: string}}
- {{"type": "navigate", "page"?: integer, "section"?: string, "documentId"?: string}}

Do not add fields that are not listed.

Request:
{query}

Respond with valid JSON only. Example:
{{"type": "search", "query": "thermodynamics", "scope": "library"}}"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extraction_prompt_includes_transcript_and_document() {
        let turns = vec![
            ConversationTurn::user("Why does ice melt?"),
            ConversationTurn::assistant("Heat flows from warmer surroundings."),
        ];
        let ctx = DocumentContext {
            document_id: Some("d1".into()),
            title: Some("Thermodynamics 101".into()),
            excerpt: None,
        };

        let prompt = entity_extraction_prompt(&turns, Some(&ctx));
        assert!(prompt.contains("user: Why does ice melt?"));
        assert!(prompt.contains("assistant: Heat flows"));
        assert!(prompt.contains("Title: Thermodynamics 101"));
        assert!(prompt.contains("\"relationships\""));
    }

    #[test]
    fn extraction_prompt_without_document_has_no_reading_block() {
        let prompt = entity_extraction_prompt(&[ConversationTurn::user("hi")], None);
        assert!(!prompt.contains("currently has this document open"));
    }

    #[test]
    fn action_prompt_lists_every_action_type() {
        let prompt = action_translation_prompt("read this page aloud");
        for kind in [
            "highlight",
            "create_note",
            "search",
            "export",
            "tts",
            "question",
            "navigate",
        ] {
            assert!(prompt.contains(&format!("\"type\": \"{kind}\"")), "missing {kind}");
        }
        assert!(prompt.contains("read this page aloud"));
    }
}

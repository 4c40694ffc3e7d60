use crate::error::{FolioError, Result};
use crate::llm::{prompts, LlmProvider};
use crate::models::{ConversationTurn, DocumentContext};

use super::types::ExtractionProposal;

/// Asks the reasoning service which entities and relationships a
/// conversation contains. Persisting them is the caller's job.
#[derive(Clone)]
pub struct EntityExtractor {
    llm: LlmProvider,
}

impl EntityExtractor {
    pub fn new(llm: LlmProvider) -> Self {
        Self { llm }
    }

    pub fn is_available(&self) -> bool {
        self.llm.is_available()
    }

    /// Proposed entities and relationships for `turns`.
    ///
    /// An unreachable reasoning service, or output that does not fit the
    /// proposal shape, yields an empty proposal rather than an error.
    pub async fn propose(
        &self,
        turns: &[ConversationTurn],
        document: Option<&DocumentContext>,
    ) -> Result<ExtractionProposal> {
        if turns.is_empty() {
            return Ok(ExtractionProposal::default());
        }

        if !self.llm.is_available() {
            tracing::warn!("LLM unavailable, skipping entity extraction");
            return Ok(ExtractionProposal::default());
        }

        let prompt = prompts::entity_extraction_prompt(turns, document);
        match self
            .llm
            .complete_structured::<ExtractionProposal>(&prompt, Some(prompts::JSON_SYSTEM_PROMPT))
            .await
        {
            Ok(proposal) => {
                tracing::debug!(
                    entities = proposal.entities.len(),
                    relationships = proposal.relationships.len(),
                    "Extraction proposal received"
                );
                Ok(proposal)
            }
            Err(e) if e.is_degradable() => {
                tracing::warn!(error = %e, "LLM unavailable during entity extraction");
                Ok(ExtractionProposal::default())
            }
            Err(e @ (FolioError::Llm(_) | FolioError::Json(_))) => {
                tracing::debug!(error = %e, "LLM returned non-conforming JSON, returning empty proposal");
                Ok(ExtractionProposal::default())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::LlmConfig;

    fn llm_for(base_url: String) -> LlmProvider {
        LlmProvider::new(Some(&LlmConfig {
            model: "openai/gpt-4o-mini".to_string(),
            api_key: Some("test-key".to_string()),
            base_url: Some(base_url),
            timeout_secs: 5,
            max_retries: 0,
        }))
    }

    fn chat_response(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "created": 1,
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }]
        })
    }

    #[tokio::test]
    async fn unavailable_llm_yields_empty_proposal() {
        let extractor = EntityExtractor::new(LlmProvider::unavailable("test"));
        let proposal = extractor
            .propose(&[ConversationTurn::user("What is entropy?")], None)
            .await
            .unwrap();
        assert!(proposal.is_empty());
    }

    #[tokio::test]
    async fn parses_fenced_proposal() {
        let server = MockServer::start().await;
        let content = "```json\n{\"entities\": [{\"ref\": \"e1\", \"type\": \"concept\", \"text\": \"Entropy\"}], \"relationships\": []}\n```";
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(content)))
            .mount(&server)
            .await;

        let extractor = EntityExtractor::new(llm_for(server.uri()));
        let proposal = extractor
            .propose(&[ConversationTurn::user("What is entropy?")], None)
            .await
            .unwrap();
        assert_eq!(proposal.entities.len(), 1);
        assert_eq!(proposal.entities[0].text, "Entropy");
    }

    #[tokio::test]
    async fn non_json_output_yields_empty_proposal() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(chat_response("I could not find anything.")),
            )
            .mount(&server)
            .await;

        let extractor = EntityExtractor::new(llm_for(server.uri()));
        let proposal = extractor
            .propose(&[ConversationTurn::user("hello")], None)
            .await
            .unwrap();
        assert!(proposal.is_empty());
    }
}

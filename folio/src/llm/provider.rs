use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{parse_provider_model, LlmConfig};
use crate::error::{FolioError, Result};
use crate::llm::api::LlmApiClient;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmBackend {
    OpenAI,
    OpenRouter,
    Ollama,
    LmStudio,
    OpenAICompatible { base_url: String },
    Unavailable { reason: String },
}

impl LlmBackend {
    pub fn name(&self) -> &'static str {
        match self {
            LlmBackend::OpenAI => "openai",
            LlmBackend::OpenRouter => "openrouter",
            LlmBackend::Ollama => "ollama",
            LlmBackend::LmStudio => "lmstudio",
            LlmBackend::OpenAICompatible { .. } => "openai-compatible",
            LlmBackend::Unavailable { .. } => "unavailable",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    /// Low-temperature settings for structured extraction.
    pub fn deterministic() -> Self {
        Self {
            temperature: Some(0.0),
            max_tokens: None,
        }
    }
}

/// Handle to the external reasoning service.
///
/// Cheap to clone. An unavailable provider answers every call with
/// [`FolioError::ServiceUnavailable`].
#[derive(Clone)]
pub struct LlmProvider {
    backend: LlmBackend,
    config: Option<Arc<LlmConfig>>,
    client: Option<Arc<LlmApiClient>>,
}

impl LlmProvider {
    pub fn new(config: Option<&LlmConfig>) -> Self {
        let Some(config) = config else {
            return Self::unavailable("No LLM configuration provided");
        };

        let (provider, _model) = parse_provider_model(&config.model);
        let backend = match (provider.to_lowercase().as_str(), &config.base_url) {
            (_, Some(base_url)) => LlmBackend::OpenAICompatible {
                base_url: base_url.clone(),
            },
            ("openai", None) => LlmBackend::OpenAI,
            ("openrouter", None) => LlmBackend::OpenRouter,
            ("ollama", None) => LlmBackend::Ollama,
            ("lmstudio", None) => LlmBackend::LmStudio,
            _ => {
                return Self::unavailable(&format!(
                    "Unknown provider in model '{}' and no LLM_BASE_URL set",
                    config.model
                ))
            }
        };

        match LlmApiClient::new(config) {
            Ok(client) => Self {
                backend,
                config: Some(Arc::new(config.clone())),
                client: Some(Arc::new(client)),
            },
            Err(e) => Self::unavailable(&e.to_string()),
        }
    }

    pub fn unavailable(reason: &str) -> Self {
        Self {
            backend: LlmBackend::Unavailable {
                reason: reason.to_string(),
            },
            config: None,
            client: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.client.is_some()
    }

    pub fn backend(&self) -> &LlmBackend {
        &self.backend
    }

    pub fn config(&self) -> Option<&LlmConfig> {
        self.config.as_deref()
    }

    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<String> {
        self.client()?.complete(prompt, system_prompt, options).await
    }

    pub async fn complete_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<Value> {
        self.client()?
            .complete_json(prompt, system_prompt, options)
            .await
    }

    pub async fn complete_structured<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<T> {
        let json_value = self
            .complete_json(prompt, system_prompt, Some(&CompletionOptions::deterministic()))
            .await?;

        serde_json::from_value(json_value)
            .map_err(|e| FolioError::Llm(format!("Failed to deserialize response: {e}")))
    }

    fn client(&self) -> Result<&LlmApiClient> {
        match (&self.client, &self.backend) {
            (Some(client), _) => Ok(client),
            (None, LlmBackend::Unavailable { reason }) => {
                Err(FolioError::ServiceUnavailable(reason.clone()))
            }
            (None, _) => Err(FolioError::ServiceUnavailable(
                "LLM client not initialized".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str, base_url: Option<&str>) -> LlmConfig {
        LlmConfig {
            model: model.to_string(),
            api_key: Some("key".to_string()),
            base_url: base_url.map(str::to_string),
            timeout_secs: 5,
            max_retries: 0,
        }
    }

    #[test]
    fn missing_config_is_unavailable() {
        let provider = LlmProvider::new(None);
        assert!(!provider.is_available());
        assert_eq!(provider.backend().name(), "unavailable");
    }

    #[test]
    fn known_prefix_selects_backend() {
        let provider = LlmProvider::new(Some(&config("openai/gpt-4o-mini", None)));
        assert!(provider.is_available());
        assert_eq!(provider.backend(), &LlmBackend::OpenAI);
    }

    #[test]
    fn base_url_means_openai_compatible() {
        let provider = LlmProvider::new(Some(&config("my-model", Some("http://localhost:9000"))));
        assert!(matches!(
            provider.backend(),
            LlmBackend::OpenAICompatible { base_url } if base_url == "http://localhost:9000"
        ));
    }

    #[test]
    fn unknown_prefix_without_base_url_is_unavailable() {
        let provider = LlmProvider::new(Some(&config("mystery", None)));
        assert!(!provider.is_available());
    }

    #[tokio::test]
    async fn unavailable_provider_reports_service_unavailable() {
        let provider = LlmProvider::unavailable("offline");
        let err = provider.complete("hi", None, None).await.unwrap_err();
        assert!(matches!(err, FolioError::ServiceUnavailable(ref r) if r == "offline"));
    }
}

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::{ApiError, OpenAIError},
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use serde_json::Value;

use crate::config::{default_base_url, parse_provider_model, LlmConfig};
use crate::error::{FolioError, Result};
use crate::llm::provider::CompletionOptions;

#[derive(Debug, Clone)]
struct ApiConfig {
    api_key: Option<String>,
    base_url: String,
    model: String,
    max_retries: u32,
}

/// Chat-completions client for any OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct LlmApiClient {
    client: Client<OpenAIConfig>,
    config: ApiConfig,
}

impl LlmApiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let (provider, model) = parse_provider_model(&config.model);
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url(provider).to_string());

        let needs_api_key = config.base_url.is_none()
            && !matches!(provider.to_lowercase().as_str(), "ollama" | "lmstudio" | "local");
        if needs_api_key && config.api_key.is_none() {
            return Err(FolioError::ServiceUnavailable(
                "API key required for this LLM provider".to_string(),
            ));
        }

        let api_config = ApiConfig {
            api_key: config.api_key.clone(),
            base_url,
            model: model.to_string(),
            max_retries: config.max_retries,
        };

        let openai_config = OpenAIConfig::new()
            .with_api_base(api_config.base_url.clone())
            .with_api_key(api_config.api_key.clone().unwrap_or_default());

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| FolioError::Llm(format!("Failed to create LLM HTTP client: {e}")))?;

        // async-openai retries 5xx on its own for up to 15 minutes unless
        // capped; keep it inside the request timeout.
        let backoff = backoff::ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(config.timeout_secs)),
            ..Default::default()
        };

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(backoff);

        Ok(Self {
            client,
            config: api_config,
        })
    }

    pub async fn complete(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<String> {
        let request = self.build_request(prompt, system_prompt, options)?;
        let response = self.send(request).await?;
        Self::extract_content(response)
    }

    /// Completion parsed as JSON. Markdown code fences around the payload
    /// are tolerated.
    pub async fn complete_json(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<Value> {
        let content = self.complete(prompt, system_prompt, options).await?;
        let payload = strip_code_fences(&content);
        serde_json::from_str(payload).map_err(|e| {
            tracing::warn!(
                response_len = content.len(),
                response_preview = %content.chars().take(100).collect::<String>(),
                error = %e,
                "Failed to parse JSON response"
            );
            FolioError::Llm(format!("Failed to parse JSON response: {e}"))
        })
    }

    async fn send(&self, request: CreateChatCompletionRequest) -> Result<CreateChatCompletionResponse> {
        let mut last_error: Option<FolioError> = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay_ms = 100 * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => return Ok(response),
                Err(error) => {
                    if Self::is_rate_limited(&error) {
                        return Err(FolioError::LlmRateLimit { retry_after: None });
                    }
                    if Self::is_auth_failure(&error) {
                        return Err(FolioError::ServiceUnavailable(format!(
                            "LLM authentication failed: {error}"
                        )));
                    }

                    let retryable = Self::is_retryable(&error);
                    let mapped = Self::map_openai_error(error);
                    if retryable && attempt < self.config.max_retries {
                        last_error = Some(mapped);
                        continue;
                    }
                    return Err(mapped);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| FolioError::Llm("LLM completion failed after retries".to_string())))
    }

    fn build_request(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
        options: Option<&CompletionOptions>,
    ) -> Result<CreateChatCompletionRequest> {
        if prompt.trim().is_empty() {
            return Err(FolioError::Validation("Prompt cannot be empty".to_string()));
        }

        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();
        if let Some(system_prompt) = system_prompt.filter(|value| !value.trim().is_empty()) {
            messages.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system_prompt)
                    .build()
                    .map_err(|e| FolioError::Validation(format!("Invalid system prompt: {e}")))?
                    .into(),
            );
        }
        messages.push(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()
                .map_err(|e| FolioError::Validation(format!("Invalid user prompt: {e}")))?
                .into(),
        );

        let mut request = CreateChatCompletionRequestArgs::default();
        request.model(self.config.model.clone()).messages(messages);
        if let Some(options) = options {
            if let Some(temperature) = options.temperature {
                request.temperature(temperature);
            }
            if let Some(max_tokens) = options.max_tokens {
                request.max_tokens(max_tokens);
            }
        }

        request
            .build()
            .map_err(|e| FolioError::Validation(format!("Invalid LLM request: {e}")))
    }

    fn extract_content(response: CreateChatCompletionResponse) -> Result<String> {
        let message = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| FolioError::Llm("LLM response contained no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        if message.trim().is_empty() {
            return Err(FolioError::Llm(
                "LLM response contained empty content".to_string(),
            ));
        }

        Ok(message)
    }

    fn is_retryable(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::ApiError(api_error) => {
                api_error.r#type.is_none() && api_error.code.is_none()
            }
            OpenAIError::Reqwest(reqwest_error) => reqwest_error
                .status()
                .map(|status| status.is_server_error())
                .unwrap_or(true),
            _ => false,
        }
    }

    fn is_rate_limited(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::Reqwest(e) => e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS),
            OpenAIError::ApiError(api_error) => api_error_matches(
                api_error,
                &["rate limit", "too many requests"],
                &["rate_limit", "insufficient_quota"],
            ),
            _ => false,
        }
    }

    fn is_auth_failure(error: &OpenAIError) -> bool {
        match error {
            OpenAIError::Reqwest(e) => matches!(
                e.status(),
                Some(reqwest::StatusCode::UNAUTHORIZED) | Some(reqwest::StatusCode::FORBIDDEN)
            ),
            OpenAIError::ApiError(api_error) => api_error_matches(
                api_error,
                &["unauthorized", "forbidden", "invalid api key", "authentication"],
                &["invalid_api_key", "authentication"],
            ),
            _ => false,
        }
    }

    /// Transport failures mean the service is unreachable; everything else
    /// is a bad answer from a reachable service.
    fn map_openai_error(error: OpenAIError) -> FolioError {
        match error {
            OpenAIError::Reqwest(e) if e.status().is_none() || e.is_timeout() => {
                FolioError::ServiceUnavailable(format!("LLM request failed: {e}"))
            }
            OpenAIError::Reqwest(e) => FolioError::Llm(format!("LLM request failed: {e}")),
            OpenAIError::ApiError(api_error) => FolioError::Llm(format!("LLM API error: {api_error}")),
            OpenAIError::JSONDeserialize(e) => {
                FolioError::Llm(format!("Failed to parse LLM response: {e}"))
            }
            OpenAIError::InvalidArgument(message) => FolioError::Validation(message),
            other => FolioError::Llm(other.to_string()),
        }
    }
}

fn api_error_matches(api_error: &ApiError, message_hints: &[&str], code_hints: &[&str]) -> bool {
    let message = api_error.message.to_lowercase();
    let error_type = api_error.r#type.clone().unwrap_or_default().to_lowercase();
    let code = api_error.code.clone().unwrap_or_default().to_lowercase();

    message_hints.iter().any(|hint| message.contains(hint))
        || code_hints
            .iter()
            .any(|hint| code.contains(hint) || error_type.contains(hint))
}

/// Remove a surrounding ```json ... ``` fence if present.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

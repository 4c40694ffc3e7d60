mod api;
pub mod prompts;
mod provider;

pub use api::{strip_code_fences, LlmApiClient};
pub use provider::{CompletionOptions, LlmBackend, LlmProvider};

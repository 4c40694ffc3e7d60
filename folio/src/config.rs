use serde::Deserialize;
use std::env;

pub(crate) fn parse_env_or<T: std::str::FromStr>(var: &str, default: T) -> T
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Using default.", val, var, e);
                default
            }
        },
        Err(_) => default,
    }
}

fn parse_env_opt<T: std::str::FromStr>(var: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(val) => match val.parse() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!("Invalid value '{}' for {}: {}. Ignoring.", val, var, e);
                None
            }
        },
        Err(_) => None,
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub embeddings: EmbeddingsConfig,
    pub llm: Option<LlmConfig>,
    pub graph: GraphConfig,
    pub detector: DetectorConfig,
    pub action_cache: ActionCacheConfig,
    pub search: SearchConfig,
    pub context: ContextConfig,
    pub interests: InterestConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub auth_token: Option<String>,
    pub local_path: Option<String>,
}

/// External embedding provider settings.
///
/// `model` may carry a provider prefix (`openai/text-embedding-3-small`),
/// which selects the default base URL when `base_url` is unset.
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub dimensions: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub cache_size: usize,
}

/// LLM configuration for chat/completion models
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

/// Caps that keep graph algorithms bounded per owner.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Most relationships loaded into one traversal.
    pub max_graph_edges: usize,
    /// Most entities considered by greedy clustering (quadratic).
    pub cluster_entity_cap: usize,
    /// Hop limit for traversal requests.
    pub max_traversal_depth: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    pub strong_threshold: f32,
    pub moderate_threshold: f32,
    pub weak_threshold: f32,
    /// Most recent items scanned per candidate population.
    pub candidate_window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActionCacheConfig {
    pub hit_threshold: f32,
    pub top_n: usize,
    /// Confidence reported for freshly translated actions.
    pub default_confidence: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub default_threshold: f32,
    pub default_limit: usize,
    /// Most recent items scanned per population during search.
    pub scan_window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextConfig {
    pub max_memories: usize,
    pub max_notes: usize,
    pub max_documents: usize,
    pub max_chars: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InterestConfig {
    pub enabled: bool,
    pub window_days: u32,
    pub refresh_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("FOLIO_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_env_or("FOLIO_PORT", 3100),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").unwrap_or_else(|_| "file:folio.db".to_string()),
                auth_token: env::var("DATABASE_AUTH_TOKEN").ok(),
                local_path: env::var("DATABASE_LOCAL_PATH").ok(),
            },
            embeddings: EmbeddingsConfig {
                model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "openai/text-embedding-3-small".to_string()),
                api_key: env::var("EMBEDDING_API_KEY").ok(),
                base_url: env::var("EMBEDDING_BASE_URL").ok(),
                dimensions: parse_env_or("EMBEDDING_DIMENSIONS", 1536),
                batch_size: parse_env_or("EMBEDDING_BATCH_SIZE", 64),
                timeout_secs: parse_env_or("EMBEDDING_TIMEOUT", 30),
                max_retries: parse_env_or("EMBEDDING_MAX_RETRIES", 3),
                cache_size: parse_env_or("EMBEDDING_CACHE_SIZE", 1000),
            },
            llm: env::var("LLM_MODEL").ok().map(|model| LlmConfig {
                model,
                api_key: env::var("LLM_API_KEY").ok(),
                base_url: env::var("LLM_BASE_URL").ok(),
                timeout_secs: parse_env_or("LLM_TIMEOUT", 30),
                max_retries: parse_env_or("LLM_MAX_RETRIES", 3),
            }),
            graph: GraphConfig {
                max_graph_edges: parse_env_or("GRAPH_MAX_EDGES", 20_000),
                cluster_entity_cap: parse_env_or("GRAPH_CLUSTER_ENTITY_CAP", 2_000),
                max_traversal_depth: parse_env_or("GRAPH_MAX_TRAVERSAL_DEPTH", 6),
            },
            detector: DetectorConfig {
                strong_threshold: parse_env_or("DETECTOR_STRONG_THRESHOLD", 0.90),
                moderate_threshold: parse_env_or("DETECTOR_MODERATE_THRESHOLD", 0.85),
                weak_threshold: parse_env_or("DETECTOR_WEAK_THRESHOLD", 0.75),
                candidate_window: parse_env_or("DETECTOR_CANDIDATE_WINDOW", 200),
            },
            action_cache: ActionCacheConfig {
                hit_threshold: parse_env_or("ACTION_CACHE_HIT_THRESHOLD", 0.85),
                top_n: parse_env_or("ACTION_CACHE_TOP_N", 50),
                default_confidence: parse_env_or("ACTION_CACHE_DEFAULT_CONFIDENCE", 0.7),
                timeout_secs: parse_env_or("ACTION_CACHE_TIMEOUT", 10),
            },
            search: SearchConfig {
                default_threshold: parse_env_or("SEARCH_DEFAULT_THRESHOLD", 0.5),
                default_limit: parse_env_or("SEARCH_DEFAULT_LIMIT", 10),
                scan_window: parse_env_or("SEARCH_SCAN_WINDOW", 500),
            },
            context: ContextConfig {
                max_memories: parse_env_or("CONTEXT_MAX_MEMORIES", 8),
                max_notes: parse_env_or("CONTEXT_MAX_NOTES", 5),
                max_documents: parse_env_or("CONTEXT_MAX_DOCUMENTS", 3),
                max_chars: parse_env_or("CONTEXT_MAX_CHARS", 6_000),
            },
            interests: InterestConfig {
                enabled: parse_env_or("ENABLE_INTEREST_REFRESH", true),
                window_days: parse_env_or("INTEREST_WINDOW_DAYS", 30),
                refresh_interval_secs: parse_env_or("INTEREST_REFRESH_INTERVAL_SECS", 21_600),
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(port) = parse_env_opt::<u16>("PORT") {
            config.server.port = port;
        }
        config
    }
}

/// Known providers that expose OpenAI-compatible APIs
pub const KNOWN_PROVIDERS: &[&str] = &["openai", "openrouter", "ollama", "lmstudio"];

/// Split `provider/model` into its parts. Unknown prefixes are treated as part
/// of a local model name.
pub fn parse_provider_model(model: &str) -> (&str, &str) {
    if let Some((prefix, rest)) = model.split_once('/') {
        let prefix_lower = prefix.to_lowercase();
        if KNOWN_PROVIDERS.contains(&prefix_lower.as_str()) {
            return (prefix, rest);
        }
    }
    ("local", model)
}

/// Default API root for a provider prefix.
pub fn default_base_url(provider: &str) -> &'static str {
    match provider.to_lowercase().as_str() {
        "openai" => "https://api.openai.com/v1",
        "openrouter" => "https://openrouter.ai/api/v1",
        "ollama" => "http://localhost:11434/v1",
        "lmstudio" => "http://localhost:1234/v1",
        _ => "https://api.openai.com/v1",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_detector_defaults() {
        env::remove_var("DETECTOR_STRONG_THRESHOLD");
        env::remove_var("DETECTOR_MODERATE_THRESHOLD");
        env::remove_var("DETECTOR_WEAK_THRESHOLD");

        let config = Config::default();
        assert_eq!(config.detector.strong_threshold, 0.90);
        assert_eq!(config.detector.moderate_threshold, 0.85);
        assert_eq!(config.detector.weak_threshold, 0.75);
        assert_eq!(config.detector.candidate_window, 200);
    }

    #[test]
    #[serial]
    fn test_action_cache_defaults() {
        env::remove_var("ACTION_CACHE_HIT_THRESHOLD");
        env::remove_var("ACTION_CACHE_TOP_N");
        env::remove_var("ACTION_CACHE_DEFAULT_CONFIDENCE");

        let config = Config::default();
        assert_eq!(config.action_cache.hit_threshold, 0.85);
        assert_eq!(config.action_cache.top_n, 50);
        assert_eq!(config.action_cache.default_confidence, 0.7);
    }

    #[test]
    #[serial]
    fn test_llm_config_from_env() {
        env::remove_var("LLM_MODEL");
        assert!(Config::default().llm.is_none());

        env::set_var("LLM_MODEL", "openai/gpt-4o-mini");
        env::set_var("LLM_MAX_RETRIES", "5");
        let llm = Config::default().llm.expect("llm config");
        assert_eq!(llm.model, "openai/gpt-4o-mini");
        assert_eq!(llm.max_retries, 5);

        env::remove_var("LLM_MODEL");
        env::remove_var("LLM_MAX_RETRIES");
    }

    #[test]
    #[serial]
    fn test_invalid_value_falls_back_to_default() {
        env::set_var("GRAPH_CLUSTER_ENTITY_CAP", "lots");
        let config = Config::default();
        assert_eq!(config.graph.cluster_entity_cap, 2_000);
        env::remove_var("GRAPH_CLUSTER_ENTITY_CAP");
    }

    #[test]
    #[serial]
    fn test_port_override() {
        env::set_var("PORT", "8088");
        assert_eq!(Config::from_env().server.port, 8088);
        env::remove_var("PORT");
    }

    #[test]
    fn test_parse_provider_model() {
        assert_eq!(
            parse_provider_model("openai/text-embedding-3-small"),
            ("openai", "text-embedding-3-small")
        );
        assert_eq!(
            parse_provider_model("nomic-ai/nomic-embed-text"),
            ("local", "nomic-ai/nomic-embed-text")
        );
        assert_eq!(default_base_url("ollama"), "http://localhost:11434/v1");
    }
}

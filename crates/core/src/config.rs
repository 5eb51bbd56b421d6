use crate::chunking::ChunkingConfig;
use crate::error::ProviderError;
use std::fmt;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CHAT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gemma2-9b-it";
pub const DEFAULT_EMBEDDING_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_EMBEDDING_ENDPOINT: &str =
    "https://router.huggingface.co/hf-inference/models/sentence-transformers/all-MiniLM-L6-v2/pipeline/feature-extraction";
pub const MINILM_DIMENSIONS: usize = 384;
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_SESSION_ID: &str = "default_session";

/// Bounded retry with exponential backoff for transient provider failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Delay before `attempt` (1-based retry number). Doubles per attempt, capped at 32x.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(5);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

#[derive(Clone)]
pub struct ChatModelConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl ChatModelConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_CHAT_BASE_URL.to_string(),
            model: DEFAULT_CHAT_MODEL.to_string(),
            api_key: api_key.into(),
            temperature: None,
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }

    pub fn completions_url(&self) -> Result<Url, ProviderError> {
        let base = format!("{}/", self.base_url.trim_end_matches('/'));
        Ok(Url::parse(&base)?.join("chat/completions")?)
    }
}

impl fmt::Debug for ChatModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatModelConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub model: String,
    pub token: String,
    pub dimensions: usize,
    pub batch_size: usize,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl EmbeddingConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            endpoint: DEFAULT_EMBEDDING_ENDPOINT.to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            token: token.into(),
            dimensions: MINILM_DIMENSIONS,
            batch_size: 32,
            timeout_secs: 60,
            retry: RetryPolicy::default(),
        }
    }
}

impl fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("token", &"<redacted>")
            .field("dimensions", &self.dimensions)
            .field("batch_size", &self.batch_size)
            .field("timeout_secs", &self.timeout_secs)
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub chunking: ChunkingConfig,
    pub top_k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

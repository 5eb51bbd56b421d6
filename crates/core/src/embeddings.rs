use crate::config::EmbeddingConfig;
use crate::error::ProviderError;
use crate::http::{build_client, post_json_with_retry, JsonRequest};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    /// One vector per input, in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_documents(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Request("empty embedding response".to_string()))
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        (**self).embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        (**self).embed_query(text).await
    }
}

/// Offline hashing embedder over character trigrams.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "char-trigram"
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Hugging Face inference feature-extraction client.
pub struct HuggingFaceEmbedder {
    config: EmbeddingConfig,
    client: Client,
}

impl HuggingFaceEmbedder {
    pub fn new(config: EmbeddingConfig) -> Result<Self, ProviderError> {
        if config.token.trim().is_empty() {
            return Err(ProviderError::Request(
                "HF_TOKEN is required for the huggingface embedder".to_string(),
            ));
        }
        url::Url::parse(&config.endpoint)?;
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Embedder for HuggingFaceEmbedder {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.config.batch_size.max(1)) {
            let body = json!({
                "inputs": batch,
                "options": { "wait_for_model": true },
            });
            let response = post_json_with_retry(
                &self.client,
                JsonRequest {
                    backend: "huggingface",
                    url: &self.config.endpoint,
                    bearer: &self.config.token,
                    body: &body,
                },
                self.config.retry,
            )
            .await?;

            let parsed = parse_feature_extraction(&response, batch.len(), self.config.dimensions)?;
            debug!(batch = batch.len(), model = %self.config.model, "embedded batch");
            vectors.extend(parsed);
        }

        Ok(vectors)
    }
}

fn parse_feature_extraction(
    response: &Value,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, ProviderError> {
    let rows = response.as_array().ok_or_else(|| ProviderError::BackendResponse {
        backend: "huggingface".to_string(),
        status: 200,
        details: format!("expected an array of vectors, got {response}"),
    })?;

    if rows.len() != expected {
        return Err(ProviderError::Request(format!(
            "embedding count {} doesn't match input count {}",
            rows.len(),
            expected
        )));
    }

    rows.iter()
        .map(|row| {
            let values = row.as_array().ok_or_else(|| {
                ProviderError::Request("embedding row is not an array".to_string())
            })?;
            let vector = values
                .iter()
                .map(|value| {
                    value.as_f64().map(|value| value as f32).ok_or_else(|| {
                        ProviderError::Request("embedding value is not a number".to_string())
                    })
                })
                .collect::<Result<Vec<f32>, ProviderError>>()?;

            if vector.len() != dimensions {
                return Err(ProviderError::Request(format!(
                    "embedding dimension {} != {}",
                    vector.len(),
                    dimensions
                )));
            }
            Ok(vector)
        })
        .collect()
}

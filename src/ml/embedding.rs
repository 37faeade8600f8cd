//! Embedding generation
//!
//! Chunks are turned into vectors by an [`EmbeddingClient`]. The OpenAI client
//! owns its retry policy and request pacing; the hash embedder is a
//! deterministic offline stand-in used for dry runs and tests.

use crate::config::EmbeddingConfig;
use crate::error::{PipelineError, Result};
use crate::ml::retry::RetryPolicy;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_openai::{Client, config::OpenAIConfig};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Embedding vector type
pub type Embedding = Vec<f32>;

/// Converts text into a fixed-length vector
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding>;

    /// Model identifier, used for logging
    fn model_name(&self) -> &str;

    /// Length of the vectors this client produces, `None` while unknown
    fn dimension(&self) -> Option<usize>;

    /// Embed texts one at a time, in order. Fails as a whole on the first error.
    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// OpenAI-compatible embeddings API client
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    retry: RetryPolicy,
    request_interval: Duration,
    last_request: Mutex<Option<Instant>>,
    /// Learned from the first response
    dimension: OnceLock<usize>,
}

impl OpenAiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config.api_key.as_deref().unwrap_or_default();
        if api_key.is_empty() && config.base_url.is_none() {
            return Err(PipelineError::Config(
                "An embedding API key (OPENAI_API_KEY) or base_url is required".to_string(),
            ));
        }

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = &config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        log::info!("Using embedding model {}", config.model);
        Ok(Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            retry: RetryPolicy::from_config(&config.retry),
            request_interval: Duration::from_millis(config.request_interval_ms),
            last_request: Mutex::new(None),
            dimension: OnceLock::new(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Wait until `request_interval` has passed since the previous request
    async fn pace(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.request_interval {
                tokio::time::sleep(self.request_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn request(&self, text: &str) -> Result<Embedding> {
        self.pace().await;

        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.as_str())
            .input(text)
            .build()?;

        let response = self.client.embeddings().create(request).await?;

        let embedding = response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| PipelineError::Embedding("Empty embedding response".to_string()))?;

        let dimension = *self.dimension.get_or_init(|| embedding.len());
        if embedding.len() != dimension {
            return Err(PipelineError::Embedding(format!(
                "model {} returned {} dimensions, expected {}",
                self.model,
                embedding.len(),
                dimension
            )));
        }
        Ok(embedding)
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        if text.is_empty() {
            return Err(PipelineError::InvalidArgument(
                "cannot embed empty text".to_string(),
            ));
        }
        self.retry.run(move || self.request(text)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }
}

/// Deterministic feature-hashing embedder that needs no network access
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimension: 384 }
    }
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(PipelineError::Config(
                "embedding dimension must be at least 1".to_string(),
            ));
        }
        Ok(Self { dimension })
    }

    fn hash_embedding(&self, text: &str) -> Embedding {
        let mut embedding = vec![0.0f32; self.dimension];

        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            if word.is_empty() {
                continue;
            }

            let mut hasher = DefaultHasher::new();
            word.hash(&mut hasher);
            let hash = hasher.finish();

            // Spread each word over a few dimensions with signed weights
            for j in 0..4u64 {
                let idx = (hash.rotate_left((j * 16) as u32) as usize) % self.dimension;
                let sign = if (hash >> (j + 60)) & 1 == 0 { 1.0 } else { -1.0 };
                embedding[idx] += sign;
            }
        }

        normalize(embedding)
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Embedding> {
        Ok(self.hash_embedding(text))
    }

    fn model_name(&self) -> &str {
        "feature-hash"
    }

    fn dimension(&self) -> Option<usize> {
        Some(self.dimension)
    }
}

/// Scale to unit length; zero vectors are returned unchanged
pub fn normalize(mut embedding: Embedding) -> Embedding {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-12 {
        for val in &mut embedding {
            *val /= norm;
        }
    }
    embedding
}

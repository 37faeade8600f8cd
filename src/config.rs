//! Configuration for pdf-embed-rs
//!
//! Every pipeline stage reads its settings from one [`Config`] tree. Values come
//! from [`Config::default`], an optional JSON file and environment overrides,
//! in that order, and are checked by [`Config::validate`] before use.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub chat: ChatConfig,
    pub storage: StorageConfig,
    pub manifest: ManifestConfig,
}

/// Sentence splitting strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitterKind {
    /// Unicode (UAX #29) sentence boundaries
    #[default]
    Unicode,
    /// Terminal punctuation followed by whitespace
    Punctuation,
}

/// Tokenizer used to measure chunk size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TokenizerKind {
    /// OpenAI BPE resolved from a model name
    Tiktoken { model: String },
    /// HuggingFace `tokenizer.json`
    HuggingFace { path: PathBuf },
    /// Whitespace-delimited words
    Whitespace,
}

impl Default for TokenizerKind {
    fn default() -> Self {
        TokenizerKind::Tiktoken {
            model: "gpt-3.5-turbo".to_string(),
        }
    }
}

/// Chunk builder settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Token threshold `T`. Signed so that a negative value in a config file
    /// surfaces as a configuration error rather than a parse error.
    pub max_tokens: i64,
    pub splitter: SplitterKind,
    pub tokenizer: TokenizerKind,
    /// Capacity of the token count cache, 0 disables it
    pub cache_capacity: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 3000,
            splitter: SplitterKind::default(),
            tokenizer: TokenizerKind::default(),
            cache_capacity: 1024,
        }
    }
}

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            multiplier: 2.0,
        }
    }
}

/// Embedding API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    /// Never serialized back out
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL (e.g. a local server)
    pub base_url: Option<String>,
    /// Minimum delay between two embedding requests
    pub request_interval_ms: u64,
    pub retry: RetryConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-ada-002".to_string(),
            api_key: None,
            base_url: None,
            request_interval_ms: 0,
            retry: RetryConfig::default(),
        }
    }
}

/// Chat completion settings for `ask`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Number of retrieved chunks passed to the model as context
    pub context_chunks: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            context_chunks: 3,
        }
    }
}

/// Vector store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub index_path: PathBuf,
    /// Records per prepared-statement batch; an upsert commits all batches at once
    pub batch_size: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("pdf_embed_index.db"),
            batch_size: 32,
        }
    }
}

/// Where the manifest mirror is written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MirrorConfig {
    /// No mirroring
    Disabled,
    /// A local directory
    Local { dir: PathBuf },
    /// An S3 bucket; credentials come from the environment
    S3 {
        bucket: String,
        region: String,
        endpoint: Option<String>,
    },
}

/// CSV manifest settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestConfig {
    pub path: PathBuf,
    /// Object key the manifest is uploaded under
    pub object_key: String,
    pub mirror: MirrorConfig,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("filenames.csv"),
            object_key: "filenames.csv".to_string(),
            mirror: MirrorConfig::Disabled,
        }
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}

impl Config {
    /// Load configuration from a JSON file; missing fields take defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.embedding.api_key = Some(key);
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.embedding.base_url = Some(url);
        }
        if let Some(model) = non_empty("PDF_EMBED_EMBEDDING_MODEL") {
            self.embedding.model = model;
        }
        if let Some(model) = non_empty("PDF_EMBED_CHAT_MODEL") {
            self.chat.model = model;
        }
        if let Some(raw) = non_empty("PDF_EMBED_MAX_TOKENS") {
            match raw.trim().parse::<i64>() {
                Ok(value) => self.chunking.max_tokens = value,
                Err(_) => log::warn!("Ignoring unparsable PDF_EMBED_MAX_TOKENS={}", raw),
            }
        }
        if let Some(path) = non_empty("PDF_EMBED_INDEX") {
            self.storage.index_path = PathBuf::from(path);
        }
        if let Some(path) = non_empty("PDF_EMBED_MANIFEST") {
            self.manifest.path = PathBuf::from(path);
        }
        if let Some(bucket) = non_empty("S3_BUCKET") {
            let region = non_empty("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string());
            self.manifest.mirror = MirrorConfig::S3 {
                bucket,
                region,
                endpoint: non_empty("AWS_ENDPOINT_URL"),
            };
        }
    }

    /// Check values that cannot be expressed by the types alone
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_tokens <= 0 {
            return Err(PipelineError::Config(format!(
                "chunking.max_tokens must be positive, got {}",
                self.chunking.max_tokens
            )));
        }
        if self.storage.batch_size == 0 {
            return Err(PipelineError::Config(
                "storage.batch_size must be at least 1".to_string(),
            ));
        }
        if self.embedding.retry.max_attempts == 0 {
            return Err(PipelineError::Config(
                "embedding.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.embedding.retry.multiplier < 1.0 {
            return Err(PipelineError::Config(format!(
                "embedding.retry.multiplier must be >= 1.0, got {}",
                self.embedding.retry.multiplier
            )));
        }
        if self.manifest.object_key.trim().is_empty() {
            return Err(PipelineError::Config(
                "manifest.object_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.chunking.max_tokens, 3000);
        assert_eq!(config.storage.batch_size, 32);
    }

    #[test]
    fn test_non_positive_threshold_rejected() {
        for value in [0, -5] {
            let mut config = Config::default();
            config.chunking.max_tokens = value;
            assert!(matches!(config.validate(), Err(PipelineError::Config(_))));
        }
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"chunking": {"max_tokens": 512, "tokenizer": {"type": "whitespace"}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chunking.max_tokens, 512);
        assert_eq!(config.chunking.tokenizer, TokenizerKind::Whitespace);
        assert_eq!(config.chunking.splitter, SplitterKind::Unicode);
        assert_eq!(config.embedding.model, "text-embedding-ada-002");
        assert_eq!(config.manifest.mirror, MirrorConfig::Disabled);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"manifest": {"mirror": {"type": "local", "dir": "/tmp/mirror"}}}"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(
            config.manifest.mirror,
            MirrorConfig::Local {
                dir: PathBuf::from("/tmp/mirror")
            }
        );
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("PDF_EMBED_MAX_TOKENS", "1200"),
            ("PDF_EMBED_INDEX", "/data/index.db"),
            ("S3_BUCKET", "csv07"),
            ("AWS_REGION", ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_env_from(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.chunking.max_tokens, 1200);
        assert_eq!(config.storage.index_path, PathBuf::from("/data/index.db"));
        assert_eq!(
            config.manifest.mirror,
            MirrorConfig::S3 {
                bucket: "csv07".to_string(),
                region: "us-east-1".to_string(),
                endpoint: None,
            }
        );
    }

    #[test]
    fn test_api_key_not_serialized() {
        let mut config = Config::default();
        config.embedding.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}

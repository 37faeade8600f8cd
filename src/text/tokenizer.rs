//! Token counting
//!
//! The chunk builder never tokenizes text itself: it asks a [`TokenCounter`]
//! how many tokens a string costs. Counters here wrap OpenAI BPE encodings,
//! HuggingFace tokenizers, a whitespace fallback and arbitrary closures.

use crate::config::{ChunkingConfig, TokenizerKind};
use crate::error::{PipelineError, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tiktoken_rs::CoreBPE;
use tokenizers::Tokenizer;

/// Maps a string to the number of tokens it costs.
///
/// Implementations must be side-effect free: the same input always yields the
/// same count.
pub trait TokenCounter: Send + Sync {
    fn count_tokens(&self, text: &str) -> Result<usize>;
}

impl<T: TokenCounter + ?Sized> TokenCounter for Arc<T> {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        (**self).count_tokens(text)
    }
}

impl<T: TokenCounter + ?Sized> TokenCounter for &T {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        (**self).count_tokens(text)
    }
}

/// OpenAI BPE token counter (`tiktoken`)
pub struct TiktokenCounter {
    bpe: CoreBPE,
    name: String,
}

impl TiktokenCounter {
    /// Encoding used by the model, e.g. `gpt-3.5-turbo` resolves to `cl100k_base`
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model).map_err(|e| {
            PipelineError::Tokenizer(format!("No BPE encoding for model {}: {}", model, e))
        })?;
        log::debug!("Loaded tiktoken encoding for model {}", model);
        Ok(Self {
            bpe,
            name: model.to_string(),
        })
    }

    /// The `cl100k_base` encoding
    pub fn cl100k() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base()
            .map_err(|e| PipelineError::Tokenizer(format!("Failed to load cl100k_base: {}", e)))?;
        Ok(Self {
            bpe,
            name: "cl100k_base".to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl TokenCounter for TiktokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(self.bpe.encode_with_special_tokens(text).len())
    }
}

/// HuggingFace tokenizer loaded from a `tokenizer.json`
pub struct HfTokenCounter {
    tokenizer: Tokenizer,
}

impl HfTokenCounter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!("Tokenizer file not found at {:?}", path);
            return Err(PipelineError::Tokenizer(format!(
                "Tokenizer file not found: {}",
                path.display()
            )));
        }

        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            PipelineError::Tokenizer(format!("Failed to load tokenizer: {}", e))
        })?;
        log::info!("Loaded tokenizer from {:?}", path);
        Ok(Self { tokenizer })
    }

    pub fn from_tokenizer(tokenizer: Tokenizer) -> Self {
        Self { tokenizer }
    }
}

impl TokenCounter for HfTokenCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(|e| PipelineError::Tokenizer(format!("Tokenization failed: {}", e)))?;
        Ok(encoding.len())
    }
}

/// Counts whitespace-delimited words
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceCounter;

impl TokenCounter for WhitespaceCounter {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        Ok(text.split_whitespace().count())
    }
}

/// Adapts a closure into a [`TokenCounter`]
pub struct FnCounter<F>(pub F);

impl<F> TokenCounter for FnCounter<F>
where
    F: Fn(&str) -> Result<usize> + Send + Sync,
{
    fn count_tokens(&self, text: &str) -> Result<usize> {
        (self.0)(text)
    }
}

/// Memoizes counts of an inner counter. Failed counts are not cached.
pub struct CachedCounter<C> {
    inner: C,
    cache: Mutex<LruCache<String, usize>>,
}

impl<C: TokenCounter> CachedCounter<C> {
    pub fn new(inner: C, capacity: NonZeroUsize) -> Self {
        Self {
            inner,
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: TokenCounter> TokenCounter for CachedCounter<C> {
    fn count_tokens(&self, text: &str) -> Result<usize> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(&count) = cache.get(text) {
                return Ok(count);
            }
        }

        let count = self.inner.count_tokens(text)?;

        if let Ok(mut cache) = self.cache.lock() {
            cache.put(text.to_string(), count);
        }
        Ok(count)
    }
}

/// Build the counter selected in the chunking configuration
pub fn counter_from_config(config: &ChunkingConfig) -> Result<Arc<dyn TokenCounter>> {
    let base: Arc<dyn TokenCounter> = match &config.tokenizer {
        TokenizerKind::Tiktoken { model } => Arc::new(TiktokenCounter::for_model(model)?),
        TokenizerKind::HuggingFace { path } => Arc::new(HfTokenCounter::from_file(path)?),
        TokenizerKind::Whitespace => Arc::new(WhitespaceCounter),
    };

    Ok(match NonZeroUsize::new(config.cache_capacity) {
        Some(capacity) => Arc::new(CachedCounter::new(base, capacity)),
        None => base,
    })
}

//! Token-bounded chunk building
//!
//! Sentences are packed greedily, in order, into chunks whose token count stays
//! below a threshold `T`. A chunk is flushed as soon as appending a sentence
//! brings it to `T` tokens or more, so the flushed chunk includes that sentence.
//! Sentences are never split: a sentence that alone reaches `T` becomes its
//! own oversized chunk.

use crate::config::ChunkingConfig;
use crate::error::{PipelineError, Result};
use crate::text::sentence::SentenceSplitter;
use crate::text::tokenizer::TokenCounter;
use std::num::NonZeroUsize;

/// Greedy sentence packer with a fixed token threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkBuilder {
    max_tokens: NonZeroUsize,
}

impl ChunkBuilder {
    /// Create a builder with threshold `max_tokens`.
    ///
    /// A threshold of zero or below is a configuration error; it is never
    /// clamped.
    pub fn new(max_tokens: i64) -> Result<Self> {
        usize::try_from(max_tokens)
            .ok()
            .and_then(NonZeroUsize::new)
            .map(|max_tokens| Self { max_tokens })
            .ok_or_else(|| {
                PipelineError::Config(format!(
                    "token threshold must be a positive integer, got {}",
                    max_tokens
                ))
            })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self> {
        Self::new(config.max_tokens)
    }

    pub fn max_tokens(&self) -> usize {
        self.max_tokens.get()
    }

    /// Pack `sentences` into chunks.
    ///
    /// Concatenating the returned chunks gives the concatenation of the input
    /// sentences. Errors from `counter` are returned as-is and no partial
    /// result is produced.
    pub fn build<S: AsRef<str>>(
        &self,
        sentences: &[S],
        counter: &dyn TokenCounter,
    ) -> Result<Vec<String>> {
        let threshold = self.max_tokens.get();
        let mut chunks = Vec::new();
        let mut buffer = String::new();

        for sentence in sentences {
            buffer.push_str(sentence.as_ref());
            if buffer.is_empty() {
                continue;
            }

            if counter.count_tokens(&buffer)? >= threshold {
                chunks.push(std::mem::take(&mut buffer));
            }
        }

        if !buffer.is_empty() {
            chunks.push(buffer);
        }

        log::debug!(
            "Packed {} sentences into {} chunks (threshold {} tokens)",
            sentences.len(),
            chunks.len(),
            threshold
        );
        Ok(chunks)
    }
}

/// Split `text` into sentences and pack them into chunks
pub fn chunk_text(
    text: &str,
    splitter: &SentenceSplitter,
    builder: &ChunkBuilder,
    counter: &dyn TokenCounter,
) -> Result<Vec<String>> {
    let sentences = splitter.split(text);
    builder.build(&sentences, counter)
}

//! Text processing for pdf-embed-rs
//!
//! This module turns extracted document text into token-bounded chunks:
//! PDF extraction, sentence splitting, token counting and chunk building.

pub mod chunking;
pub mod pdf;
pub mod sentence;
pub mod tokenizer;

// Re-export main types and functions
pub use chunking::{ChunkBuilder, chunk_text};
pub use pdf::{ExtractedDocument, PdfProcessor};
pub use sentence::SentenceSplitter;
pub use tokenizer::{
    CachedCounter, FnCounter, HfTokenCounter, TiktokenCounter, TokenCounter, WhitespaceCounter,
    counter_from_config,
};

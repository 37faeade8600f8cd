//! # pdf-embed-rs
//!
//! Turns PDF documents into token-bounded text chunks, embeds each chunk, and
//! stores the vectors for semantic search and question answering.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_embed::{ChunkBuilder, SentenceSplitter, TiktokenCounter, chunk_text};
//! use pdf_embed::config::SplitterKind;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let splitter = SentenceSplitter::new(SplitterKind::Unicode)?;
//!     let builder = ChunkBuilder::new(3000)?;
//!     let counter = TiktokenCounter::for_model("gpt-3.5-turbo")?;
//!
//!     let chunks = chunk_text("First sentence. Second sentence.", &splitter, &builder, &counter)?;
//!     for chunk in chunks {
//!         println!("{}", chunk);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core modules
pub mod api;
pub mod config;
pub mod error;
pub mod ml;
pub mod storage;
pub mod text;
pub mod utils;

// Re-export main API types
pub use api::{Answer, ChatClient, Ingestor, ask, search};
pub use config::Config;
pub use error::{PipelineError, Result};

// Re-export commonly used types
pub use ml::{EmbeddingClient, HashEmbedder, OpenAiEmbedder, RetryPolicy};
pub use storage::{DocumentRecord, IngestStats, Manifest, ObjectMirror, SqliteStore, VectorStore};
pub use text::{
    ChunkBuilder, ExtractedDocument, PdfProcessor, SentenceSplitter, TiktokenCounter, TokenCounter,
    chunk_text,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_imports() {
        // Ensure all major types can be imported
        let config = Config::default();
        assert!(config.validate().is_ok());
    }
}

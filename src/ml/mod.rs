//! Embedding clients and vector similarity
//!
//! This module provides the embedding collaborator used after chunking, the
//! retry policy it owns, and exact cosine search over stored vectors.

pub mod embedding;
pub mod retry;
pub mod search;

// Re-export main types and functions
pub use embedding::{Embedding, EmbeddingClient, HashEmbedder, OpenAiEmbedder, normalize};
pub use retry::RetryPolicy;
pub use search::{cosine_similarity, top_k};

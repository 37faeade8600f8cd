//! API layer for pdf-embed-rs
//!
//! This module provides the public entry points: fetching documents,
//! ingesting them into the vector store, and searching or asking questions.

pub mod chat;
pub mod fetch;
pub mod ingest;

// Re-export main API types
pub use chat::{Answer, ChatClient, ask, search};
pub use fetch::{fetch_document, load_document};
pub use ingest::{Ingestor, remove_document};

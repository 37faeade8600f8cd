//! Storage functionality for pdf-embed-rs
//!
//! Vector records live behind the [`VectorStore`] trait (an embedded SQLite
//! implementation is provided). The CSV manifest of ingested filenames and its
//! object-storage mirror live here as well.

pub mod database;
pub mod manifest;
pub mod mirror;
pub mod schema;

use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// Re-export main types
pub use database::SqliteStore;
pub use manifest::Manifest;
pub use mirror::ObjectMirror;

/// One embedded chunk and its payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: u64,
    /// Source document name, used to group and delete records
    pub filename: String,
    /// Chunk text
    pub text: String,
    /// Document-level metadata (PDF title)
    pub metadata: String,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
}

/// A record returned by a similarity query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredRecord {
    /// Cosine similarity to the query
    pub score: f32,
    pub record: DocumentRecord,
}

/// Vector database operations used by the pipeline
pub trait VectorStore: Send {
    /// Id to assign to the next record: one past the largest stored id
    fn next_id(&self) -> Result<u64>;

    /// Insert records, replacing any with the same id
    fn upsert(&mut self, records: &[DocumentRecord]) -> Result<()>;

    /// Delete every record of a document, returning how many were removed
    fn delete_by_filename(&mut self, filename: &str) -> Result<usize>;

    /// Most similar records, optionally restricted to one document
    fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        filename: Option<&str>,
    ) -> Result<Vec<ScoredRecord>>;

    /// Distinct document names, sorted
    fn filenames(&self) -> Result<Vec<String>>;

    fn count(&self) -> Result<usize>;
}

/// Ingestion statistics
#[derive(Debug, Clone, Serialize)]
pub struct IngestStats {
    pub filename: String,
    pub sentences: usize,
    pub chunks: usize,
    /// Id of the first upserted record, `None` when nothing was stored
    pub first_id: Option<u64>,
    /// Total processing time in seconds
    pub processing_time: f64,
}

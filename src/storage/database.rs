//! SQLite vector store
//!
//! Records are kept in a single `vectors` table with embeddings stored as
//! little-endian `f32` blobs. Queries are exact: every candidate is scored.

use crate::error::{PipelineError, Result};
use crate::ml::search::top_k;
use crate::storage::schema::*;
use crate::storage::{DocumentRecord, ScoredRecord, VectorStore};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;

const SELECT_COLUMNS: &str = "SELECT id, filename, text, metadata, embedding, created_at FROM vectors";

/// Embedded SQLite implementation of [`VectorStore`]
pub struct SqliteStore {
    conn: Connection,
    batch_size: usize,
}

impl SqliteStore {
    /// Open (or create) a store at `path`
    pub fn open<P: AsRef<Path>>(path: P, batch_size: usize) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| PipelineError::Storage(format!("Failed to open database: {}", e)))?;

        let mut store = Self {
            conn,
            batch_size: batch_size.max(1),
        };
        store.initialize()?;
        log::info!("Opened vector store at {}", path.as_ref().display());
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            PipelineError::Storage(format!("Failed to create in-memory database: {}", e))
        })?;

        let mut store = Self {
            conn,
            batch_size: 32,
        };
        store.initialize()?;
        Ok(store)
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Initialize database schema
    fn initialize(&mut self) -> Result<()> {
        self.conn
            .execute_batch(CREATE_METADATA_TABLE)
            .map_err(|e| PipelineError::Storage(format!("Failed to create metadata table: {}", e)))?;

        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM metadata WHERE key = 'schema_version'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(version) = existing {
            let version: u32 = version.parse().map_err(|_| {
                PipelineError::Storage(format!("Corrupt schema version: {}", version))
            })?;
            if version > SCHEMA_VERSION {
                return Err(PipelineError::Storage(format!(
                    "Database schema version {} is newer than supported version {}",
                    version, SCHEMA_VERSION
                )));
            }
        }

        self.conn
            .execute_batch(CREATE_VECTORS_TABLE)
            .map_err(|e| PipelineError::Storage(format!("Failed to create vectors table: {}", e)))?;
        self.conn
            .execute_batch(CREATE_VECTORS_INDEXES)
            .map_err(|e| PipelineError::Storage(format!("Failed to create indexes: {}", e)))?;

        self.conn
            .execute(
                "INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', ?)",
                params![SCHEMA_VERSION.to_string()],
            )
            .map_err(|e| PipelineError::Storage(format!("Failed to set schema version: {}", e)))?;

        log::debug!("Database initialized with schema version {}", SCHEMA_VERSION);
        Ok(())
    }

    /// Fetch a record by id
    pub fn get(&self, id: u64) -> Result<Option<DocumentRecord>> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let record = self
            .conn
            .query_row(&sql, params![id as i64], row_to_record)
            .optional()
            .map_err(|e| PipelineError::Storage(format!("Failed to query record {}: {}", id, e)))?;
        Ok(record)
    }

    fn load_candidates(&self, filename: Option<&str>) -> Result<Vec<DocumentRecord>> {
        let records = match filename {
            Some(name) => {
                let sql = format!("{} WHERE filename = ? ORDER BY id", SELECT_COLUMNS);
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map(params![name], row_to_record)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            None => {
                let sql = format!("{} ORDER BY id", SELECT_COLUMNS);
                let mut stmt = self.conn.prepare(&sql)?;
                let rows = stmt.query_map([], row_to_record)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(records)
    }
}

impl VectorStore for SqliteStore {
    fn next_id(&self) -> Result<u64> {
        let max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(id) FROM vectors", [], |row| row.get(0))
            .map_err(|e| PipelineError::Storage(format!("Failed to read max id: {}", e)))?;
        Ok(max.map(|id| id as u64 + 1).unwrap_or(0))
    }

    /// All records are written in one transaction; a failing row rolls back
    /// the whole call.
    fn upsert(&mut self, records: &[DocumentRecord]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| PipelineError::Storage(format!("Failed to start transaction: {}", e)))?;

        {
            let mut stmt = tx
                .prepare_cached(
                    r#"
                    INSERT OR REPLACE INTO vectors
                        (id, filename, text, metadata, dimension, embedding, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .map_err(|e| PipelineError::Storage(format!("Failed to prepare statement: {}", e)))?;

            for (batch_index, batch) in records.chunks(self.batch_size).enumerate() {
                for record in batch {
                    stmt.execute(params![
                        record.id as i64,
                        record.filename,
                        record.text,
                        record.metadata,
                        record.embedding.len() as i64,
                        encode_embedding(&record.embedding),
                        record.created_at.to_rfc3339(),
                    ])
                    .map_err(|e| {
                        PipelineError::Storage(format!(
                            "Failed to upsert record {}: {}",
                            record.id, e
                        ))
                    })?;
                }
                log::debug!("Wrote batch {} ({} records)", batch_index + 1, batch.len());
            }
        }

        // Dropping `tx` without committing rolls everything back
        tx.commit()
            .map_err(|e| PipelineError::Storage(format!("Failed to commit transaction: {}", e)))?;

        log::info!("Upserted {} records", records.len());
        Ok(())
    }

    fn delete_by_filename(&mut self, filename: &str) -> Result<usize> {
        let deleted = self
            .conn
            .execute("DELETE FROM vectors WHERE filename = ?", params![filename])
            .map_err(|e| PipelineError::Storage(format!("Failed to delete {}: {}", filename, e)))?;
        log::info!("Deleted {} records for {}", deleted, filename);
        Ok(deleted)
    }

    fn query(
        &self,
        embedding: &[f32],
        top_k_results: usize,
        filename: Option<&str>,
    ) -> Result<Vec<ScoredRecord>> {
        let candidates = self.load_candidates(filename)?;
        let ranked = top_k(
            embedding,
            candidates.iter().map(|r| (r, r.embedding.as_slice())),
            top_k_results,
        )?;

        Ok(ranked
            .into_iter()
            .map(|(score, record)| ScoredRecord {
                score,
                record: record.clone(),
            })
            .collect())
    }

    fn filenames(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT filename FROM vectors ORDER BY filename")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<rusqlite::Result<Vec<String>>>()?)
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM vectors", [], |row| row.get(0))
            .map_err(|e| PipelineError::Storage(format!("Failed to count records: {}", e)))?;
        Ok(count as usize)
    }
}

fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for &val in embedding {
        bytes.extend_from_slice(&val.to_le_bytes());
    }
    bytes
}

fn decode_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn row_to_record(row: &Row) -> rusqlite::Result<DocumentRecord> {
    let blob: Vec<u8> = row.get(4)?;
    let created_at: String = row.get(5)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(DocumentRecord {
        id: row.get::<_, i64>(0)? as u64,
        filename: row.get(1)?,
        text: row.get(2)?,
        metadata: row.get(3)?,
        embedding: decode_embedding(&blob),
        created_at,
    })
}

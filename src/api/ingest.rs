//! Ingestor - document ingestion API
//!
//! Drives one document through the whole pipeline: fetch, extract, split,
//! chunk, embed, upsert, then record it in the manifest and mirror the
//! manifest. Every collaborator is passed in at construction.

use crate::api::fetch::{fetch_document, load_document};
use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::ml::EmbeddingClient;
use crate::storage::{DocumentRecord, IngestStats, Manifest, ObjectMirror, VectorStore};
use crate::text::{ChunkBuilder, ExtractedDocument, SentenceSplitter, TokenCounter};
use crate::utils::filename_from_source;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;

/// Document ingestion pipeline
pub struct Ingestor {
    splitter: SentenceSplitter,
    builder: ChunkBuilder,
    counter: Arc<dyn TokenCounter>,
    embedder: Arc<dyn EmbeddingClient>,
    store: Box<dyn VectorStore>,
    manifest: Manifest,
    mirror: Option<ObjectMirror>,
    http: reqwest::Client,
    show_progress: bool,
}

impl Ingestor {
    /// Create an ingestor. Fails with a configuration error if `config` is
    /// invalid, before anything is fetched or chunked.
    pub fn new(
        config: &Config,
        counter: Arc<dyn TokenCounter>,
        embedder: Arc<dyn EmbeddingClient>,
        store: Box<dyn VectorStore>,
        manifest: Manifest,
        mirror: Option<ObjectMirror>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            splitter: SentenceSplitter::new(config.chunking.splitter)?,
            builder: ChunkBuilder::from_config(&config.chunking)?,
            counter,
            embedder,
            store,
            manifest,
            mirror,
            http: reqwest::Client::new(),
            show_progress: false,
        })
    }

    /// Show a progress bar while embedding
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn store(&self) -> &dyn VectorStore {
        self.store.as_ref()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Ingest a document from a URL or local path
    pub async fn ingest(&mut self, source: &str) -> Result<IngestStats> {
        let filename = filename_from_source(source).ok_or_else(|| {
            PipelineError::InvalidArgument(format!("Cannot derive a document name from {}", source))
        })?;

        let bytes = fetch_document(&self.http, source).await?;
        let document = load_document(&filename, &bytes)?;
        self.ingest_document(&filename, document).await
    }

    /// Ingest already extracted text under `filename`.
    ///
    /// Nothing is written unless every chunk was embedded successfully.
    pub async fn ingest_document(
        &mut self,
        filename: &str,
        document: ExtractedDocument,
    ) -> Result<IngestStats> {
        let start_time = std::time::Instant::now();

        let sentences = self.splitter.split(&document.text);
        let chunks = self.builder.build(&sentences, self.counter.as_ref())?;
        log::info!(
            "{}: {} sentences packed into {} chunks",
            filename,
            sentences.len(),
            chunks.len()
        );

        if chunks.is_empty() {
            log::warn!("{}: no text extracted, nothing to store", filename);
            return Ok(IngestStats {
                filename: filename.to_string(),
                sentences: 0,
                chunks: 0,
                first_id: None,
                processing_time: start_time.elapsed().as_secs_f64(),
            });
        }

        let embeddings = self.embed_chunks(&chunks).await?;

        let first_id = self.store.next_id()?;
        let created_at = Utc::now();
        let records: Vec<DocumentRecord> = chunks
            .into_iter()
            .zip(embeddings)
            .zip(first_id..)
            .map(|((text, embedding), id)| DocumentRecord {
                id,
                filename: filename.to_string(),
                text,
                metadata: document.metadata.clone(),
                embedding,
                created_at,
            })
            .collect();

        self.store.upsert(&records)?;

        self.manifest.append(filename)?;
        sync_manifest(&self.manifest, self.mirror.as_ref()).await?;

        Ok(IngestStats {
            filename: filename.to_string(),
            sentences: sentences.len(),
            chunks: records.len(),
            first_id: Some(first_id),
            processing_time: start_time.elapsed().as_secs_f64(),
        })
    }

    /// Delete every vector of a document and drop it from the manifest
    pub async fn remove(&mut self, filename: &str) -> Result<usize> {
        remove_document(
            self.store.as_mut(),
            &mut self.manifest,
            self.mirror.as_ref(),
            filename,
        )
        .await
    }

    async fn embed_chunks(&self, chunks: &[String]) -> Result<Vec<Vec<f32>>> {
        log::info!(
            "Generating {} embeddings with {}",
            chunks.len(),
            self.embedder.model_name()
        );

        let progress = if self.show_progress {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} ({elapsed})") {
                spinner.set_style(style);
            }
            spinner.set_message(format!("embedding {} chunks", chunks.len()));
            spinner.enable_steady_tick(Duration::from_millis(120));
            spinner
        } else {
            ProgressBar::hidden()
        };

        let embeddings = self.embedder.embed_all(chunks).await;
        progress.finish_and_clear();
        embeddings
    }
}

/// Delete every vector of `filename`, drop it from the manifest and mirror
/// the manifest. Needs no embedding client.
///
/// The mirror is written even when the manifest did not change, so a mirror
/// left stale by an earlier failed upload catches up.
pub async fn remove_document(
    store: &mut dyn VectorStore,
    manifest: &mut Manifest,
    mirror: Option<&ObjectMirror>,
    filename: &str,
) -> Result<usize> {
    let deleted = store.delete_by_filename(filename)?;
    manifest.remove(filename)?;
    sync_manifest(manifest, mirror).await?;
    Ok(deleted)
}

async fn sync_manifest(manifest: &Manifest, mirror: Option<&ObjectMirror>) -> Result<()> {
    if let Some(mirror) = mirror {
        mirror.upload(manifest.to_csv().into_bytes()).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerKind;
    use crate::ml::HashEmbedder;
    use crate::storage::SqliteStore;
    use crate::text::WhitespaceCounter;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds like `HashEmbedder` but fails on the `fail_on`-th call (1-based)
    struct FlakyEmbedder {
        inner: HashEmbedder,
        calls: AtomicUsize,
        fail_on: usize,
    }

    #[async_trait]
    impl EmbeddingClient for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(PipelineError::Embedding("model overloaded".to_string()));
            }
            self.inner.embed(text).await
        }

        fn model_name(&self) -> &str {
            "flaky"
        }

        fn dimension(&self) -> Option<usize> {
            self.inner.dimension()
        }
    }

    fn test_config(max_tokens: i64) -> Config {
        let mut config = Config::default();
        config.chunking.max_tokens = max_tokens;
        config.chunking.tokenizer = TokenizerKind::Whitespace;
        config
    }

    fn ingestor(config: &Config, dir: &std::path::Path) -> Ingestor {
        Ingestor::new(
            config,
            Arc::new(WhitespaceCounter),
            Arc::new(HashEmbedder::new(16).unwrap()),
            Box::new(SqliteStore::memory().unwrap()),
            Manifest::open(dir.join("filenames.csv")).unwrap(),
            Some(ObjectMirror::local(dir.join("mirror"), "filenames.csv").unwrap()),
        )
        .unwrap()
    }

    fn document(text: &str) -> ExtractedDocument {
        ExtractedDocument {
            text: text.to_string(),
            metadata: "Form 1-A".to_string(),
            page_count: 1,
        }
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(0);
        let result = Ingestor::new(
            &config,
            Arc::new(WhitespaceCounter),
            Arc::new(HashEmbedder::default()),
            Box::new(SqliteStore::memory().unwrap()),
            Manifest::open(dir.path().join("m.csv")).unwrap(),
            None,
        );
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_ingest_document_assigns_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut ingestor = ingestor(&test_config(4), dir.path());

        let stats = ingestor
            .ingest_document("a.pdf", document("One two three. Four five. Six."))
            .await
            .unwrap();
        assert_eq!(stats.sentences, 3);
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.first_id, Some(0));

        let stats = ingestor
            .ingest_document("b.pdf", document("Seven eight."))
            .await
            .unwrap();
        assert_eq!(stats.first_id, Some(2));
        assert_eq!(ingestor.store().count().unwrap(), 3);
        assert_eq!(
            ingestor.manifest().names(),
            ["a.pdf".to_string(), "b.pdf".to_string()]
        );

        let mirrored = std::fs::read_to_string(dir.path().join("mirror/filenames.csv")).unwrap();
        assert_eq!(mirrored, "Name\na.pdf\nb.pdf\n");
    }

    #[tokio::test]
    async fn test_empty_document_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ingestor = ingestor(&test_config(10), dir.path());

        let stats = ingestor
            .ingest_document("blank.pdf", document(""))
            .await
            .unwrap();
        assert_eq!(stats.chunks, 0);
        assert_eq!(stats.first_id, None);
        assert_eq!(ingestor.store().count().unwrap(), 0);
        assert!(ingestor.manifest().names().is_empty());
    }

    #[tokio::test]
    async fn test_remove_document() {
        let dir = tempfile::tempdir().unwrap();
        let mut ingestor = ingestor(&test_config(100), dir.path());
        ingestor
            .ingest_document("a.pdf", document("Alpha. Beta."))
            .await
            .unwrap();

        assert_eq!(ingestor.remove("a.pdf").await.unwrap(), 1);
        assert_eq!(ingestor.store().count().unwrap(), 0);
        assert!(!ingestor.manifest().contains("a.pdf"));
    }

    #[tokio::test]
    async fn test_ingest_local_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "Local notes. More notes.").unwrap();

        let mut ingestor = ingestor(&test_config(100), dir.path());
        let stats = ingestor.ingest(path.to_str().unwrap()).await.unwrap();

        assert_eq!(stats.filename, "notes.txt");
        assert_eq!(stats.chunks, 1);
        let records = ingestor
            .store()
            .query(&HashEmbedder::new(16).unwrap().embed("notes").await.unwrap(), 1, None)
            .unwrap();
        assert_eq!(records[0].record.text, "Local notes. More notes.");
        assert_eq!(records[0].record.metadata, "");
    }

    #[tokio::test]
    async fn test_embedding_failure_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FlakyEmbedder {
            inner: HashEmbedder::new(16).unwrap(),
            calls: AtomicUsize::new(0),
            fail_on: 2,
        });
        let mut ingestor = Ingestor::new(
            &test_config(2),
            Arc::new(WhitespaceCounter),
            embedder.clone(),
            Box::new(SqliteStore::memory().unwrap()),
            Manifest::open(dir.path().join("filenames.csv")).unwrap(),
            Some(ObjectMirror::local(dir.path().join("mirror"), "filenames.csv").unwrap()),
        )
        .unwrap();

        let result = ingestor
            .ingest_document("a.pdf", document("One two. Three four. Five six."))
            .await;

        assert!(matches!(result, Err(PipelineError::Embedding(_))));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 2);
        assert_eq!(ingestor.store().count().unwrap(), 0);
        assert!(ingestor.manifest().names().is_empty());
        assert!(!dir.path().join("filenames.csv").exists());
        assert!(!dir.path().join("mirror/filenames.csv").exists());
    }

    #[tokio::test]
    async fn test_mirror_catches_up_after_failed_upload() {
        let dir = tempfile::tempdir().unwrap();
        let mut ingestor = ingestor(&test_config(100), dir.path());

        // A directory where the manifest object should go makes the upload fail
        let blocked = dir.path().join("mirror/filenames.csv");
        std::fs::create_dir_all(&blocked).unwrap();
        let result = ingestor.ingest_document("a.pdf", document("Alpha.")).await;
        assert!(matches!(result, Err(PipelineError::ObjectStore(_))));
        assert!(ingestor.manifest().contains("a.pdf"));

        std::fs::remove_dir(&blocked).unwrap();
        ingestor
            .ingest_document("a.pdf", document("Alpha."))
            .await
            .unwrap();

        let mirrored = std::fs::read_to_string(&blocked).unwrap();
        assert_eq!(mirrored, "Name\na.pdf\n");
    }

    #[tokio::test]
    async fn test_remove_document_without_embedder() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SqliteStore::memory().unwrap();
        store
            .upsert(&[DocumentRecord {
                id: 0,
                filename: "a.pdf".to_string(),
                text: "Alpha.".to_string(),
                metadata: String::new(),
                embedding: vec![1.0, 0.0],
                created_at: Utc::now(),
            }])
            .unwrap();
        let mut manifest = Manifest::open(dir.path().join("filenames.csv")).unwrap();
        manifest.append("a.pdf").unwrap();
        manifest.append("b.pdf").unwrap();
        let mirror = ObjectMirror::local(dir.path().join("mirror"), "filenames.csv").unwrap();

        let deleted = remove_document(&mut store, &mut manifest, Some(&mirror), "a.pdf")
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.count().unwrap(), 0);
        assert_eq!(manifest.names(), ["b.pdf".to_string()]);

        // Removing an unknown name still refreshes the mirror
        std::fs::remove_file(dir.path().join("mirror/filenames.csv")).unwrap();
        let deleted = remove_document(&mut store, &mut manifest, Some(&mirror), "zzz.pdf")
            .await
            .unwrap();
        assert_eq!(deleted, 0);
        let mirrored = std::fs::read_to_string(dir.path().join("mirror/filenames.csv")).unwrap();
        assert_eq!(mirrored, "Name\nb.pdf\n");
    }
}

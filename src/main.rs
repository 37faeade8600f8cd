//! pdf-embed CLI application
//!
//! Command-line interface for the pdf-embed-rs library.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use pdf_embed::api::{
    ChatClient, Ingestor, ask, fetch_document, load_document, remove_document, search,
};
use pdf_embed::config::{Config, SplitterKind};
use pdf_embed::ml::{EmbeddingClient, HashEmbedder, OpenAiEmbedder};
use pdf_embed::storage::{Manifest, ObjectMirror, SqliteStore, VectorStore};
use pdf_embed::text::{ChunkBuilder, SentenceSplitter, TokenCounter, counter_from_config};
use pdf_embed::utils::{filename_from_source, format_file_size, preview};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "pdf-embed")]
#[command(about = "Split PDFs into token-bounded chunks, embed them and search them")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use the offline hash embedder instead of the embeddings API
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a document into chunks and print them
    Chunk {
        /// PDF or text file
        input: PathBuf,

        /// Token threshold per chunk
        #[arg(long)]
        max_tokens: Option<i64>,

        /// Sentence splitting strategy
        #[arg(long, value_enum)]
        splitter: Option<SplitterArg>,

        /// Print chunks as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Fetch, chunk, embed and store documents
    Ingest {
        /// URLs or local paths
        #[arg(required = true)]
        sources: Vec<String>,
    },

    /// Remove a document from the index and the manifest
    Delete {
        /// Document name as listed in the manifest
        filename: String,
    },

    /// List ingested documents
    List,

    /// Show the chunks most similar to a query
    Search {
        query: String,

        /// Number of results to return
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Only search chunks of this document
        #[arg(long)]
        file: Option<String>,
    },

    /// Answer a question from the ingested documents
    Ask {
        question: String,

        /// Number of chunks to retrieve
        #[arg(short = 'k', long, default_value = "5")]
        top_k: usize,

        /// Only answer from chunks of this document
        #[arg(long)]
        file: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SplitterArg {
    Unicode,
    Punctuation,
}

impl From<SplitterArg> for SplitterKind {
    fn from(arg: SplitterArg) -> Self {
        match arg {
            SplitterArg::Unicode => SplitterKind::Unicode,
            SplitterArg::Punctuation => SplitterKind::Punctuation,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Chunk {
            input,
            max_tokens,
            splitter,
            json,
        } => {
            chunk_command(config, input, max_tokens, splitter, json).await?;
        }
        Commands::Ingest { sources } => {
            ingest_command(&config, cli.offline, sources).await?;
        }
        Commands::Delete { filename } => {
            delete_command(&config, &filename).await?;
        }
        Commands::List => {
            list_command(&config)?;
        }
        Commands::Search { query, top_k, file } => {
            search_command(&config, cli.offline, &query, top_k, file.as_deref()).await?;
        }
        Commands::Ask {
            question,
            top_k,
            file,
        } => {
            ask_command(&config, cli.offline, &question, top_k, file.as_deref()).await?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_env();
    Ok(config)
}

fn embedder(config: &Config, offline: bool) -> anyhow::Result<Arc<dyn EmbeddingClient>> {
    if offline {
        return Ok(Arc::new(HashEmbedder::default()));
    }
    let embedder = OpenAiEmbedder::new(&config.embedding)
        .context("set OPENAI_API_KEY or pass --offline")?;
    Ok(Arc::new(embedder))
}

fn open_store(config: &Config) -> anyhow::Result<SqliteStore> {
    let store = SqliteStore::open(&config.storage.index_path, config.storage.batch_size)
        .with_context(|| format!("opening {}", config.storage.index_path.display()))?;
    Ok(store)
}

fn build_ingestor(config: &Config, offline: bool) -> anyhow::Result<Ingestor> {
    config.validate()?;
    let ingestor = Ingestor::new(
        config,
        counter_from_config(&config.chunking)?,
        embedder(config, offline)?,
        Box::new(open_store(config)?),
        Manifest::open(&config.manifest.path)?,
        ObjectMirror::from_config(&config.manifest)?,
    )?;
    Ok(ingestor.with_progress(true))
}

async fn chunk_command(
    mut config: Config,
    input: PathBuf,
    max_tokens: Option<i64>,
    splitter: Option<SplitterArg>,
    json: bool,
) -> anyhow::Result<()> {
    if let Some(max_tokens) = max_tokens {
        config.chunking.max_tokens = max_tokens;
    }
    if let Some(splitter) = splitter {
        config.chunking.splitter = splitter.into();
    }

    let builder = ChunkBuilder::from_config(&config.chunking)?;
    let splitter = SentenceSplitter::new(config.chunking.splitter)?;
    let counter = counter_from_config(&config.chunking)?;

    let source = input.to_string_lossy();
    let filename = filename_from_source(&source)
        .with_context(|| format!("no file name in {}", input.display()))?;
    let bytes = fetch_document(&reqwest::Client::new(), &source).await?;
    let document = load_document(&filename, &bytes)?;

    let sentences = splitter.split(&document.text);
    let chunks = builder.build(&sentences, counter.as_ref())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!(
        "📄 {} ({}): {} sentences, {} chunks, threshold {} tokens",
        filename,
        format_file_size(bytes.len() as u64),
        sentences.len(),
        chunks.len(),
        builder.max_tokens()
    );
    for (i, chunk) in chunks.iter().enumerate() {
        let tokens = counter.count_tokens(chunk)?;
        println!("\n--- chunk {} ({} tokens) ---", i + 1, tokens);
        println!("{}", chunk);
    }

    Ok(())
}

async fn ingest_command(config: &Config, offline: bool, sources: Vec<String>) -> anyhow::Result<()> {
    let mut ingestor = build_ingestor(config, offline)?;
    let mut failures = 0;

    for source in sources {
        println!("📄 Processing: {}", source);
        match ingestor.ingest(&source).await {
            Ok(stats) => println!(
                "   ✅ {}: {} chunks from {} sentences in {:.2}s",
                stats.filename, stats.chunks, stats.sentences, stats.processing_time
            ),
            Err(e) => {
                failures += 1;
                eprintln!("❌ Failed to ingest {}: {}", source, e);
            }
        }
    }

    println!(
        "📋 Index now holds {} chunks from {} documents",
        ingestor.store().count()?,
        ingestor.manifest().names().len()
    );

    if failures > 0 {
        anyhow::bail!("{} source(s) failed to ingest", failures);
    }
    Ok(())
}

async fn delete_command(config: &Config, filename: &str) -> anyhow::Result<()> {
    let mut store = open_store(config)?;
    let mut manifest = Manifest::open(&config.manifest.path)?;
    let mirror = ObjectMirror::from_config(&config.manifest)?;
    let deleted = remove_document(&mut store, &mut manifest, mirror.as_ref(), filename).await?;
    if deleted == 0 {
        println!("❌ No chunks stored for {}", filename);
    } else {
        println!("🗑️  Deleted {} chunks of {}", deleted, filename);
    }
    Ok(())
}

fn list_command(config: &Config) -> anyhow::Result<()> {
    let manifest = Manifest::open(&config.manifest.path)?;
    let store = open_store(config)?;

    if manifest.names().is_empty() {
        println!("No documents ingested yet");
        return Ok(());
    }
    for name in manifest.names() {
        println!("{}", name);
    }
    println!(
        "\n{} documents, {} chunks",
        manifest.names().len(),
        store.count()?
    );
    Ok(())
}

async fn search_command(
    config: &Config,
    offline: bool,
    query: &str,
    top_k: usize,
    file: Option<&str>,
) -> anyhow::Result<()> {
    println!("🔍 Searching for: \"{}\"", query);

    let embedder = embedder(config, offline)?;
    let store = open_store(config)?;
    let results = search(query, top_k, file, embedder.as_ref(), &store).await?;

    if results.is_empty() {
        println!("❌ No results found");
        return Ok(());
    }

    println!("📋 Found {} results:", results.len());
    println!();
    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. Score: {:.3} [{} #{}]",
            i + 1,
            result.score,
            result.record.filename,
            result.record.id
        );
        println!("   {}", preview(&result.record.text, 300));
        println!();
    }

    Ok(())
}

async fn ask_command(
    config: &Config,
    offline: bool,
    question: &str,
    top_k: usize,
    file: Option<&str>,
) -> anyhow::Result<()> {
    let embedder = embedder(config, offline)?;
    let store = open_store(config)?;
    let chat = if offline {
        None
    } else {
        ChatClient::from_config(&config.embedding, &config.chat)
    };

    let answer = ask(question, top_k, file, embedder.as_ref(), &store, chat.as_ref()).await?;
    println!("{}", answer.text);

    if !answer.sources.is_empty() {
        println!("\nSources:");
        for source in &answer.sources {
            println!("  {} (score {:.3})", source.record.filename, source.score);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "pdf-embed",
            "chunk",
            "form1-a.pdf",
            "--max-tokens",
            "512",
            "--splitter",
            "punctuation",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Chunk {
                input,
                max_tokens,
                splitter,
                json,
            } => {
                assert_eq!(input, PathBuf::from("form1-a.pdf"));
                assert_eq!(max_tokens, Some(512));
                assert!(matches!(splitter, Some(SplitterArg::Punctuation)));
                assert!(json);
            }
            _ => panic!("expected chunk command"),
        }

        let cli = Cli::try_parse_from([
            "pdf-embed",
            "ingest",
            "https://www.sec.gov/files/form1-a.pdf",
            "local.pdf",
            "--config",
            "pipeline.json",
            "--offline",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("pipeline.json")));
        assert!(cli.offline);
        assert!(matches!(cli.command, Commands::Ingest { ref sources } if sources.len() == 2));

        let cli = Cli::try_parse_from(["pdf-embed", "ask", "What is Regulation A?", "-k", "3"])
            .unwrap();
        assert!(matches!(cli.command, Commands::Ask { top_k: 3, file: None, .. }));

        let cli = Cli::try_parse_from([
            "pdf-embed",
            "search",
            "audited financials",
            "--file",
            "form1-a.pdf",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Search { top_k: 5, file: Some(ref file), .. } if file == "form1-a.pdf"
        ));
    }

    #[test]
    fn test_ingest_requires_sources() {
        assert!(Cli::try_parse_from(["pdf-embed", "ingest"]).is_err());
    }

    #[tokio::test]
    async fn test_delete_needs_no_api_key() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.embedding.api_key = None;
        config.storage.index_path = temp_dir.path().join("index.db");
        config.manifest.path = temp_dir.path().join("filenames.csv");

        let mut manifest = Manifest::open(&config.manifest.path).unwrap();
        manifest.append("a.pdf").unwrap();

        delete_command(&config, "a.pdf").await.unwrap();
        assert!(Manifest::open(&config.manifest.path).unwrap().names().is_empty());
    }

    #[test]
    fn test_negative_max_tokens_parses() {
        let cli = Cli::try_parse_from(["pdf-embed", "chunk", "a.txt", "--max-tokens=-1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Chunk {
                max_tokens: Some(-1),
                ..
            }
        ));
    }
}

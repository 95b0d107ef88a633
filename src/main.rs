//! # devhelper CLI (`devh`)
//!
//! The `devh` binary answers questions about a codebase using
//! retrieval-augmented generation. It accepts a local directory, a
//! repository URL, or a webpage as the source.
//!
//! ## Usage
//!
//! ```bash
//! devh --config ./devhelper.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `devh index <source>` | Build (or rebuild) the vector index for a source |
//! | `devh ask <source> "<question>"` | Answer one question about a source |
//! | `devh chat <source>` | Interactive question loop with transcript support |
//! | `devh chunks <source>` | Preview how a source splits into chunks |
//! | `devh suggest <source>` | Recommend chunking parameters for a source |
//!
//! ## Examples
//!
//! ```bash
//! # Index a local project
//! devh index ./my-project
//!
//! # Ask about a repository snapshot (no git required)
//! devh ask https://github.com/owner/repo "how is auth handled?"
//!
//! # Chat against a webpage using local models
//! devh chat https://example.com/docs --web --engine local --llm local
//!
//! # Force a rebuild with explicit chunking parameters
//! devh index ./my-project --chunk-size 400 --chunk-overlap 50 --reindex
//! ```

use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use devhelper::advisor;
use devhelper::chunker;
use devhelper::config::{self, Config, EngineKind};
use devhelper::embedding::{create_embedder, Embedder};
use devhelper::fetch;
use devhelper::history::ChatLog;
use devhelper::index::{fingerprint, VectorIndex};
use devhelper::llm::create_model;
use devhelper::loader;
use devhelper::models::SourceDocument;
use devhelper::router;

/// devhelper — retrieval-augmented question answering over a codebase.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file; a missing file falls back to built-in defaults.
#[derive(Parser)]
#[command(
    name = "devh",
    about = "devhelper — ask questions about a codebase, repository, or webpage",
    version,
    long_about = "devhelper ingests a local directory, a repository snapshot, or a webpage; \
    chunks and embeds the text into a persistent fingerprinted vector index; and answers \
    questions by routing them to a whole-project summary or a top-k retrieval-QA prompt."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./devhelper.toml`. Storage, chunking, retrieval,
    /// embedding, model, and policy settings are read from this file.
    #[arg(long, global = true, default_value = "./devhelper.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Source and chunking flags shared by every command that touches an index.
#[derive(clap::Args)]
struct SourceArgs {
    /// Source: a local directory, an `https://<host>/<owner>/<repo>` URL,
    /// or (with `--web`) any webpage URL.
    source: String,

    /// Treat the source as a webpage rather than a repository URL.
    #[arg(long)]
    web: bool,

    /// Override the chunk size in characters (disables auto-tuning).
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Override the chunk overlap in characters (disables auto-tuning).
    #[arg(long)]
    chunk_overlap: Option<usize>,

    /// Directory names to skip while loading (repeatable).
    #[arg(long = "exclude")]
    exclude_dirs: Vec<String>,
}

/// Backend selection flags.
#[derive(clap::Args)]
struct EngineArgs {
    /// Embedding engine: `remote` (hosted API) or `local` (Ollama).
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Language model engine: `remote` (hosted API) or `local` (Ollama).
    #[arg(long, value_enum)]
    llm: Option<EngineKind>,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Build the vector index for a source.
    ///
    /// Loads the source, splits it into overlapping chunks (README chunks
    /// are duplicated and listed first), embeds the chunks, and persists
    /// the index under the storage root keyed by a content fingerprint.
    /// A second run against an unchanged source is a cache hit and does
    /// nothing unless `--reindex` is passed.
    Index {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        engines: EngineArgs,

        /// Rebuild even when a persisted index already exists.
        #[arg(long)]
        reindex: bool,
    },

    /// Answer one question about a source.
    ///
    /// Opens the persisted index (building it first on a cache miss),
    /// routes the question to summary or retrieval-QA mode, and prints
    /// the model's answer.
    Ask {
        #[command(flatten)]
        source: SourceArgs,

        /// The question to answer.
        question: String,

        #[command(flatten)]
        engines: EngineArgs,

        /// Chunks retrieved for a standard question.
        #[arg(long)]
        top_k: Option<usize>,

        /// Rebuild the index before answering.
        #[arg(long)]
        reindex: bool,
    },

    /// Interactive question loop over a source.
    ///
    /// Reads questions from stdin until `exit`, `quit`, or end of input.
    /// Every exchange is recorded; pass `--transcript` to save the
    /// session as pretty-printed JSON.
    Chat {
        #[command(flatten)]
        source: SourceArgs,

        #[command(flatten)]
        engines: EngineArgs,

        /// Chunks retrieved for a standard question.
        #[arg(long)]
        top_k: Option<usize>,

        /// Rebuild the index before starting.
        #[arg(long)]
        reindex: bool,

        /// Write the session transcript to this JSON file on exit.
        #[arg(long)]
        transcript: Option<PathBuf>,
    },

    /// Preview how a source splits into chunks, without embedding.
    ///
    /// Useful for tuning chunk size and overlap before paying for an
    /// embedding run.
    Chunks {
        #[command(flatten)]
        source: SourceArgs,

        /// Maximum number of chunks to print.
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Recommend chunking parameters for a source directory.
    ///
    /// Counts the lines of recognized files and suggests a (size, overlap)
    /// pair scaled to the corpus volume.
    Suggest {
        /// Local source directory.
        source: PathBuf,
    },
}

/// A resolved source: documents plus the key that goes into the
/// fingerprint and, when the source is a directory on disk, its path
/// (used by the chunking advisor).
struct ResolvedSource {
    documents: Vec<SourceDocument>,
    source_key: String,
    local_dir: Option<PathBuf>,
}

/// Materialize a source: fetch repository snapshots into the clone
/// directory, fetch webpages into a single document, and read local
/// directories in place.
async fn resolve_source(args: &SourceArgs, cfg: &Config) -> anyhow::Result<ResolvedSource> {
    if args.web {
        let doc = fetch::fetch_webpage(&args.source).await?;
        return Ok(ResolvedSource {
            documents: vec![doc],
            source_key: args.source.clone(),
            local_dir: None,
        });
    }

    let dir = if args.source.starts_with("https://") {
        println!("Fetching repository snapshot: {}", args.source);
        fetch::fetch_repo(&args.source, &cfg.storage.clone_dir).await?
    } else {
        let path = PathBuf::from(&args.source);
        if !path.is_dir() {
            anyhow::bail!("source directory not found: {}", path.display());
        }
        path
    };

    let documents = loader::load_codebase(&dir, None, &args.exclude_dirs)?;
    Ok(ResolvedSource {
        documents,
        source_key: args.source.clone(),
        local_dir: Some(dir),
    })
}

/// Pick chunking parameters: explicit flags win, then the auto-tuning
/// advisor (for directory sources), then the configured defaults.
fn resolve_chunk_params(args: &SourceArgs, cfg: &Config, local_dir: Option<&Path>) -> (usize, usize) {
    match (args.chunk_size, args.chunk_overlap) {
        (Some(size), Some(overlap)) => (size, overlap),
        (Some(size), None) => (size, cfg.chunking.chunk_overlap),
        (None, Some(overlap)) => (cfg.chunking.chunk_size, overlap),
        (None, None) => {
            if cfg.chunking.auto_tune {
                if let Some(dir) = local_dir {
                    return advisor::suggest_chunk_config(dir);
                }
            }
            (cfg.chunking.chunk_size, cfg.chunking.chunk_overlap)
        }
    }
}

/// Open the persisted index for a source, building it on a cache miss or
/// when `reindex` is set.
async fn open_or_build_index(
    args: &SourceArgs,
    cfg: &Config,
    embedder: &dyn Embedder,
    reindex: bool,
) -> anyhow::Result<VectorIndex> {
    let resolved = resolve_source(args, cfg).await?;
    let (chunk_size, chunk_overlap) =
        resolve_chunk_params(args, cfg, resolved.local_dir.as_deref());
    let fp = fingerprint(&resolved.source_key, chunk_size, chunk_overlap);

    if !reindex && VectorIndex::exists(&cfg.storage.root, &fp) {
        println!("Using cached index {fp}");
        return Ok(VectorIndex::load(&fp, &cfg.storage.root)?);
    }

    println!(
        "Indexing {} ({} files, chunk_size={chunk_size}, chunk_overlap={chunk_overlap})",
        resolved.source_key,
        resolved.documents.len()
    );
    let chunks = chunker::chunk_documents(&resolved.documents, chunk_size, chunk_overlap)?;
    let index = VectorIndex::build(
        chunks,
        &fp,
        embedder,
        &cfg.storage.root,
        cfg.embedding.batch_size,
    )
    .await?;
    println!("Indexed {} chunks as {fp}", index.len());
    Ok(index)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index {
            source,
            engines,
            reindex,
        } => {
            let embedder = create_embedder(
                &cfg.embedding,
                &cfg.policy,
                engines.engine.unwrap_or(cfg.embedding.engine),
            )?;
            open_or_build_index(&source, &cfg, embedder.as_ref(), reindex).await?;
        }

        Commands::Ask {
            source,
            question,
            engines,
            top_k,
            reindex,
        } => {
            let embedder = create_embedder(
                &cfg.embedding,
                &cfg.policy,
                engines.engine.unwrap_or(cfg.embedding.engine),
            )?;
            let model = create_model(
                &cfg.llm,
                &cfg.policy,
                engines.llm.unwrap_or(cfg.llm.engine),
            )?;
            let index = open_or_build_index(&source, &cfg, embedder.as_ref(), reindex).await?;

            let mut retrieval = cfg.retrieval.clone();
            if let Some(k) = top_k {
                retrieval.top_k = k;
            }

            let result = router::answer(
                &index,
                embedder.as_ref(),
                model.as_ref(),
                &retrieval,
                &question,
            )
            .await?;
            println!("{}", result.answer);
        }

        Commands::Chat {
            source,
            engines,
            top_k,
            reindex,
            transcript,
        } => {
            let embedder = create_embedder(
                &cfg.embedding,
                &cfg.policy,
                engines.engine.unwrap_or(cfg.embedding.engine),
            )?;
            let model = create_model(
                &cfg.llm,
                &cfg.policy,
                engines.llm.unwrap_or(cfg.llm.engine),
            )?;
            let index = open_or_build_index(&source, &cfg, embedder.as_ref(), reindex).await?;

            let mut retrieval = cfg.retrieval.clone();
            if let Some(k) = top_k {
                retrieval.top_k = k;
            }

            let mut log = ChatLog::new();
            let stdin = std::io::stdin();
            println!("Ask questions about {} (exit/quit to stop)", source.source);
            loop {
                print!("> ");
                std::io::stdout().flush()?;
                let mut line = String::new();
                if stdin.lock().read_line(&mut line)? == 0 {
                    break;
                }
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
                    break;
                }

                let result = router::answer(
                    &index,
                    embedder.as_ref(),
                    model.as_ref(),
                    &retrieval,
                    question,
                )
                .await?;
                println!("{}\n", result.answer);
                log.record(question, result.answer);
            }

            if let Some(path) = transcript {
                if log.is_empty() {
                    println!("No exchanges to save.");
                } else {
                    log.save(&path)?;
                    println!("Transcript saved to {}", path.display());
                }
            }
        }

        Commands::Chunks { source, limit } => {
            let resolved = resolve_source(&source, &cfg).await?;
            let (chunk_size, chunk_overlap) =
                resolve_chunk_params(&source, &cfg, resolved.local_dir.as_deref());
            let chunks =
                chunker::chunk_documents(&resolved.documents, chunk_size, chunk_overlap)?;

            println!(
                "{} files -> {} chunks (chunk_size={chunk_size}, chunk_overlap={chunk_overlap})",
                resolved.documents.len(),
                chunks.len()
            );
            for chunk in chunks.iter().take(limit) {
                let preview: String = chunk.text.chars().take(80).collect();
                println!(
                    "[{}#{}] {} chars: {}",
                    chunk.source_id,
                    chunk.sequence_index,
                    chunk.text.chars().count(),
                    preview.replace('\n', " ")
                );
            }
            if chunks.len() > limit {
                println!("... and {} more", chunks.len() - limit);
            }
        }

        Commands::Suggest { source } => {
            if !source.is_dir() {
                anyhow::bail!("source directory not found: {}", source.display());
            }
            let (chunk_size, chunk_overlap) = advisor::suggest_chunk_config(&source);
            println!(
                "Suggested chunking for {}: chunk_size={chunk_size}, chunk_overlap={chunk_overlap}",
                source.display()
            );
        }
    }

    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use semsearch_core::config::{expand_path, Config, ProviderKind, ProviderSettings, Settings};
use semsearch_core::corpus::{count_corpus_dir, load_corpus_dir};
use semsearch_core::traits::{EmbeddingProvider, SearchEngine, VectorStore};
use semsearch_embed::{build_reranker, Provider};
use semsearch_hybrid::{HybridPipeline, SemanticSearch};
use semsearch_vector::{open_store, IngestEvent, IngestOptions, Ingestor};

const FALLBACK_PROVIDER: &str = "fake";

#[derive(Parser, Debug)]
#[command(name = "semsearch", about = "Semantic search over a directory of text documents")]
struct Cli {
    /// Directory holding config.toml and its environment overlays
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed every document of the corpus not yet in the store
    Ingest {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Re-embed stored documents whose text changed
        #[arg(long)]
        reembed_changed: bool,
    },
    /// Rank stored documents against a query
    Search {
        #[arg(long)]
        provider: Option<String>,
        /// Rerank a wider candidate set with the configured reranker
        #[arg(long)]
        rerank: bool,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
        query: String,
    },
    /// Report corpus and index sizes
    Stats {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("SEMSEARCH_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

/// The named provider, else the only/first configured one, else the
/// offline fake embedder.
fn select_provider(settings: &Settings, name: Option<&str>) -> Result<(String, ProviderSettings)> {
    if let Some(name) = name {
        return Ok((name.to_string(), settings.provider(name)?.clone()));
    }
    match settings.providers.iter().next() {
        Some((name, provider)) => Ok((name.clone(), provider.clone())),
        None => Ok((FALLBACK_PROVIDER.to_string(), ProviderSettings::new(ProviderKind::Fake))),
    }
}

struct Backend {
    provider: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
}

fn open_backend(settings: &Settings, name: Option<&str>) -> Result<Backend> {
    let (name, provider_settings) = select_provider(settings, name)?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(Provider::from_settings(&provider_settings)?);
    let store = open_store(&settings.store_for(&name), provider.dimension())?;
    info!(provider = %provider.tag(), store = %store.name(), "backend ready");
    Ok(Backend { provider, store })
}

fn corpus_dir(settings: &Settings, flag: Option<PathBuf>) -> PathBuf {
    flag.unwrap_or_else(|| expand_path(settings.ingest.corpus_dir.to_string_lossy()))
}

fn ingest(settings: &Settings, provider: Option<&str>, corpus: Option<PathBuf>, reembed_changed: bool) -> Result<()> {
    let dir = corpus_dir(settings, corpus);
    let entries = load_corpus_dir(&dir).with_context(|| format!("loading corpus from {}", dir.display()))?;
    let backend = open_backend(settings, provider)?;

    let pb = ProgressBar::new(entries.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} docs ({percent}%) {msg}")?
            .progress_chars("#>-"),
    );
    let bar = pb.clone();
    let mut options = IngestOptions::from(&settings.ingest);
    options.reembed_changed |= reembed_changed;
    let ingestor = Ingestor::new(backend.provider, backend.store, options).with_progress(move |event| {
        bar.inc(1);
        match event {
            IngestEvent::Embedded(id) => bar.set_message(id.clone()),
            IngestEvent::Failed(id) => bar.println(format!("failed: {id}")),
            IngestEvent::Skipped(_) => {}
        }
    });

    let report = tokio::runtime::Runtime::new()?.block_on(ingestor.run(entries))?;
    pb.finish_and_clear();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn search(settings: &Settings, provider: Option<&str>, rerank: bool, top_k: Option<usize>, query: &str) -> Result<()> {
    let backend = open_backend(settings, provider)?;
    let semantic = SemanticSearch::new(backend.provider, backend.store).with_error_policy(settings.search.on_error);
    let engine: Box<dyn SearchEngine> = if rerank {
        let reranker_settings = settings
            .reranker
            .as_ref()
            .ok_or_else(|| anyhow!("--rerank needs a [reranker] section in the configuration"))?;
        let reranker = Arc::from(build_reranker(reranker_settings)?);
        Box::new(HybridPipeline::new(semantic, reranker).with_settings(&settings.search))
    } else {
        Box::new(semantic)
    };
    let results = engine.search(query, top_k.unwrap_or(settings.search.top_k))?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

fn stats(settings: &Settings, provider: Option<&str>, corpus: Option<PathBuf>) -> Result<()> {
    let documents = count_corpus_dir(&corpus_dir(settings, corpus))?;
    let backend = open_backend(settings, provider)?;
    let tag = backend.provider.tag().to_string();
    let store = backend.store.name().to_string();
    let engine = SemanticSearch::new(backend.provider, backend.store).with_corpus_size(documents);
    let stats = engine.stats()?;
    let out = serde_json::json!({ "provider": tag, "store": store, "stats": stats });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let config = match &cli.config_dir {
        Some(dir) => Config::load_from(dir)?,
        None => Config::load()?,
    };
    let settings = config.settings()?;

    match cli.command {
        Command::Ingest { provider, corpus, reembed_changed } => ingest(&settings, provider.as_deref(), corpus, reembed_changed),
        Command::Search { provider, rerank, top_k, query } => search(&settings, provider.as_deref(), rerank, top_k, &query),
        Command::Stats { provider, corpus } => stats(&settings, provider.as_deref(), corpus),
    }
}

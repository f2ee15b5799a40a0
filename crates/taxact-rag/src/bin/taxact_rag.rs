//! taxact-rag command line
//!
//! Run with: cargo run -p taxact-rag -- <command>

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taxact_rag::config::RagConfig;
use taxact_rag::generation::AnswerGenerator;
use taxact_rag::index::{BuildTargets, IndexBuilder, IndexLayout, IndexManifest};
use taxact_rag::ingestion::{
    load_parsed_documents, ChunkRunReport, ChunkStore, DedupContext, SectionChunker,
};
use taxact_rag::providers::build_providers;
use taxact_rag::retrieval::Retriever;
use taxact_rag::types::{is_tax_related, FilterValue, MetadataFilter, QueryRequest};
use taxact_rag::RagPipeline;

#[derive(Parser, Debug)]
#[command(
    name = "taxact-rag",
    version,
    about = "Ask questions about the Nigerian Tax Reform Acts with section-level citations"
)]
struct Cli {
    /// TOML configuration file (environment variables override its values)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chunk every *_parsed.json document into the chunk store
    Chunk {
        /// Deduplicate within each document instead of across the corpus
        #[arg(long)]
        per_document: bool,
    },

    /// Embed the chunk store and build index artifacts
    Index {
        #[arg(long, value_enum, default_value_t = Target::Both)]
        target: Target,
    },

    /// Answer a question
    Query {
        question: String,

        #[arg(long)]
        top_k: Option<usize>,

        /// Metadata filter as field=value (repeatable)
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, FilterValue)>,

        #[arg(long)]
        temperature: Option<f32>,

        /// Answer even when the question looks out of scope
        #[arg(long)]
        force: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the chunks a question retrieves, without generating an answer
    Search {
        query: String,

        #[arg(long)]
        top_k: Option<usize>,

        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, FilterValue)>,
    },

    /// Summarise the chunk report and index manifest
    Stats,

    /// Check that the LLM provider is reachable and the configured backend loads
    Health,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Target {
    Flat,
    Collection,
    Both,
}

impl From<Target> for BuildTargets {
    fn from(target: Target) -> Self {
        match target {
            Target::Flat => BuildTargets::Flat,
            Target::Collection => BuildTargets::Collection,
            Target::Both => BuildTargets::Both,
        }
    }
}

fn parse_filter(raw: &str) -> std::result::Result<(String, FilterValue), String> {
    let (field, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got '{}'", raw))?;

    let value = match value {
        "true" => FilterValue::Bool(true),
        "false" => FilterValue::Bool(false),
        v => match v.parse::<i64>() {
            Ok(n) => FilterValue::Integer(n),
            Err(_) => FilterValue::Text(v.to_string()),
        },
    };
    Ok((field.trim().to_string(), value))
}

fn to_filter(pairs: Vec<(String, FilterValue)>) -> Option<MetadataFilter> {
    if pairs.is_empty() {
        return None;
    }
    Some(
        pairs
            .into_iter()
            .fold(MetadataFilter::new(), |f, (field, value)| f.eq(field, value)),
    )
}

fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message(message.to_string());
    spinner
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "taxact_rag=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = RagConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Chunk { per_document } => run_chunk(&config, per_document),
        Command::Index { target } => run_index(&config, target.into()).await,
        Command::Query {
            question,
            top_k,
            filters,
            temperature,
            force,
            json,
        } => {
            let mut request = QueryRequest::new(question);
            request.top_k = top_k;
            request.filters = to_filter(filters);
            request.temperature = temperature.unwrap_or(config.llm.temperature);
            request.max_tokens = config.llm.max_tokens;
            run_query(&config, request, force, json).await
        }
        Command::Search {
            query,
            top_k,
            filters,
        } => run_search(&config, &query, top_k, to_filter(filters)).await,
        Command::Stats => run_stats(&config),
        Command::Health => run_health(&config).await,
    }
}

fn run_chunk(config: &RagConfig, per_document: bool) -> Result<()> {
    let docs = load_parsed_documents(&config.paths.processed_dir)?;
    println!("Chunking {} documents", style(docs.len()).bold());

    let chunker = SectionChunker::from_config(&config.chunking);
    let mut dedup = DedupContext::new();
    let mut chunks = Vec::new();
    let mut duplicates = 0;

    for doc in &docs {
        chunks.extend(chunker.chunk_document(doc, &mut dedup));
        if per_document {
            duplicates += dedup.duplicates_dropped();
            dedup.reset();
        }
    }
    duplicates += dedup.duplicates_dropped();

    ChunkStore::new(config.paths.chunks_file()).write_all(&chunks)?;
    let report = ChunkRunReport::new(&chunks, &config.chunking, duplicates);
    report.save(&config.paths.chunk_report_file())?;

    println!(
        "{} {} chunks ({} duplicates removed, {} invalid)",
        style("✓").green(),
        report.total_chunks,
        report.duplicates_removed,
        report.validation.invalid_chunks
    );
    for issue in report.validation.issues.iter().take(5) {
        println!("  {} {}", style("!").yellow(), issue);
    }
    Ok(())
}

async fn run_index(config: &RagConfig, targets: BuildTargets) -> Result<()> {
    let chunks = ChunkStore::new(config.paths.chunks_file()).read_all()?;
    let providers = build_providers(config)?;

    let builder = IndexBuilder::new(
        providers.embedder,
        IndexLayout::new(&config.paths.embeddings_dir),
    )
    .with_batch_size(config.embeddings.batch_size)
    .with_targets(targets);

    let progress = spinner(&format!("Embedding {} chunks...", chunks.len()));
    let output = builder.build(&chunks).await;
    progress.finish_and_clear();
    let output = output?;

    let manifest = &output.manifest;
    println!(
        "{} Indexed {} chunks ({} dimensions, {})",
        style("✓").green(),
        manifest.total_chunks,
        manifest.dimension,
        manifest.embedding_model
    );
    if manifest.degraded_batches > 0 {
        println!(
            "  {} {} batches failed and were stored as zero vectors",
            style("!").yellow(),
            manifest.degraded_batches
        );
    }
    Ok(())
}

async fn run_query(
    config: &RagConfig,
    request: QueryRequest,
    force: bool,
    json: bool,
) -> Result<()> {
    request.validate()?;

    if !force && !is_tax_related(&request.question) {
        println!(
            "This assistant answers questions about the Nigerian Tax Reform Acts. \
             Rephrase your question or pass --force to ask anyway."
        );
        return Ok(());
    }

    let pipeline = RagPipeline::from_config(config)?;
    let progress = spinner("Retrieving and generating...");
    let result = pipeline.query(&request).await;
    progress.finish_and_clear();

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}\n", result.answer());
        println!("{}", style(&result.formatted_sources).dim());
        if let Some(usage) = result.usage() {
            println!(
                "\n{} tokens ({} prompt, {} completion) · {}",
                usage.total,
                usage.prompt,
                usage.completion,
                result.model()
            );
        }
    }

    if let Some(error) = result.generation.error() {
        bail!("query failed ({:?}): {}", error.kind, error.message);
    }
    Ok(())
}

async fn run_search(
    config: &RagConfig,
    query: &str,
    top_k: Option<usize>,
    filters: Option<MetadataFilter>,
) -> Result<()> {
    let pipeline = RagPipeline::from_config(config)?;
    let results = pipeline.search(query, filters.as_ref(), top_k).await?;

    if results.is_empty() {
        println!("No matching chunks.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let source = pipeline.retriever().get_sources(std::slice::from_ref(result));
        let label = source
            .first()
            .map(|s| s.format_citation())
            .unwrap_or_default();
        println!(
            "{} {} {}",
            style(format!("[{}]", i + 1)).cyan(),
            label,
            style(format!("(distance {:.4}, id {})", result.distance, result.id)).dim()
        );
        let preview: String = result.text.chars().take(240).collect();
        println!("    {}\n", preview);
    }
    Ok(())
}

async fn run_health(config: &RagConfig) -> Result<()> {
    let providers = build_providers(config)?;
    let generator = AnswerGenerator::new(providers.llm);

    let llm_ok = generator.is_available().await;
    let mark = |ok: bool| if ok { style("✓").green() } else { style("✗").red() };
    println!("{} LLM {}", mark(llm_ok), generator.model());

    let index = Retriever::from_config(config, providers.embedder);
    match &index {
        Ok(retriever) => println!(
            "{} {} backend ({} chunks)",
            mark(true),
            retriever.backend().name(),
            retriever.backend().len()?
        ),
        Err(e) => println!("{} index: {}", mark(false), e),
    }

    if !llm_ok || index.is_err() {
        bail!("health check failed");
    }
    Ok(())
}

fn run_stats(config: &RagConfig) -> Result<()> {
    let report = ChunkRunReport::load(&config.paths.chunk_report_file())?;
    println!("{}", style("Chunks").bold());
    println!("  total:        {}", report.total_chunks);
    println!(
        "  size/overlap: {}/{}",
        report.chunk_size, report.chunk_overlap
    );
    println!("  duplicates:   {}", report.duplicates_removed);
    println!(
        "  valid:        {}/{}",
        report.validation.valid_chunks, report.validation.total_chunks
    );
    let s = &report.statistics;
    println!(
        "  features:     {} definitions, {} rates, {} dates, {} amounts, {} uncertain",
        s.with_definitions, s.with_rates, s.with_dates, s.with_amounts, s.with_uncertainties
    );

    let layout = IndexLayout::new(&config.paths.embeddings_dir);
    match IndexManifest::load(&layout.manifest()) {
        Ok(manifest) => {
            println!("{}", style("Index").bold());
            println!("  model:        {}", manifest.embedding_model);
            println!("  dimension:    {}", manifest.dimension);
            println!("  chunks:       {}", manifest.total_chunks);
            println!("  built:        {}", manifest.created_at.to_rfc3339());
            println!("  flat index:   {}", manifest.flat_index_path.is_some());
            println!("  collection:   {}", manifest.collection_path.is_some());
            println!("  degraded:     {}", manifest.degraded_batches);
        }
        Err(e) => println!("{} {}", style("Index not built:").yellow(), e),
    }
    Ok(())
}

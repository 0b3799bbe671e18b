use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use ng12_retrieval::embedding::provider_from_config;
use ng12_retrieval::index::BuildProgress;
use ng12_retrieval::ingest::ingest_pages;
use ng12_retrieval::{
    Chunk, Gender, GuidelineIndex, PageText, RetrievalEngine, SearchHit, Settings,
};

#[derive(Parser)]
#[command(name = "ng12-retrieval")]
#[command(about = "Section-aware retrieval over the NICE NG12 suspected-cancer guideline")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file (default: ng12-retrieval.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest guideline page text and build the index
    Ingest {
        /// Text file with form-feed page separators (pdftotext output)
        input: PathBuf,

        /// Index directory (overrides config)
        #[arg(long)]
        index: Option<PathBuf>,
    },

    /// Semantic search with free text
    Query {
        /// Query text
        text: String,

        /// Number of results
        #[arg(short = 'k', long = "top-k", default_value_t = 5)]
        top_k: usize,

        /// Per-query embedding deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Emit JSON instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// Search by patient symptom profile
    Symptoms {
        /// Symptoms (one or more)
        #[arg(required = true)]
        symptom: Vec<String>,

        /// Patient age in years
        #[arg(long)]
        age: u32,

        /// Patient gender: M, F, or Other
        #[arg(long, default_value = "other")]
        gender: Gender,

        /// Number of results
        #[arg(short = 'k', long = "top-k", default_value_t = 5)]
        top_k: usize,

        /// Emit JSON instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// Print every chunk of a section in document order
    Section {
        /// Section identifier (e.g. 1.1)
        id: String,

        /// Emit JSON instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// List chunks in actionable urgency tiers, most urgent first
    Urgent {
        /// Maximum chunks to list
        #[arg(short = 'k', long = "top-k", default_value_t = 10)]
        top_k: usize,

        /// Emit JSON instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// Show index statistics
    Stats {
        /// Emit JSON instead of human-readable output
        #[arg(long)]
        json: bool,
    },

    /// Show current configuration
    Config,
}

fn main() {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };
    let settings = settings.unwrap_or_else(|e| {
        eprintln!("Configuration error: {e}");
        std::process::exit(1);
    });
    if let Err(problem) = settings.check() {
        eprintln!("Invalid configuration: {problem}");
        std::process::exit(1);
    }

    ng12_retrieval::logging::init_with_config(&settings.logging);

    let result = match cli.command {
        Commands::Ingest { input, index } => run_ingest(&settings, &input, index),
        Commands::Query {
            text,
            top_k,
            timeout_ms,
            json,
        } => run_query(&settings, &text, top_k, timeout_ms, json),
        Commands::Symptoms {
            symptom,
            age,
            gender,
            top_k,
            json,
        } => run_symptoms(&settings, symptom, age, gender, top_k, json),
        Commands::Section { id, json } => run_section(&settings, &id, json),
        Commands::Urgent { top_k, json } => run_urgent(&settings, top_k, json),
        Commands::Stats { json } => run_stats(&settings, json),
        Commands::Config => run_config(&settings),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Split a text file into pages on form feeds, the pdftotext convention.
/// A trailing empty page from a final form feed is dropped.
fn read_pages(path: &Path) -> anyhow::Result<Vec<PageText>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let mut pages: Vec<&str> = raw.split('\u{c}').collect();
    if pages.len() > 1 && pages.last().is_some_and(|last| last.trim().is_empty()) {
        pages.pop();
    }

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(idx, text)| PageText::new(idx as u32 + 1, text))
        .collect())
}

fn run_ingest(
    settings: &Settings,
    input: &Path,
    index_override: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut settings = settings.clone();
    if let Some(path) = index_override {
        settings.index_path = path;
    }

    let pages = read_pages(input)?;
    println!("Read {} pages from {}", pages.len(), input.display());

    let provider = provider_from_config(&settings.embedding)?;
    println!(
        "Embedding model: {} ({} dimensions)",
        provider.model_id(),
        provider.dimensions()
    );

    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );

    let (_index, report) = ingest_pages(&pages, &settings, provider.as_ref(), |progress| {
        match progress {
            BuildProgress::GeneratingEmbeddings { current, total } => {
                bar.set_length(total as u64);
                bar.set_message("embedding");
                bar.set_position(current as u64);
            }
            BuildProgress::StoringChunks { current, total } => {
                bar.set_length(total as u64);
                bar.set_message("storing");
                bar.set_position(current as u64);
            }
        }
    })?;
    bar.finish_and_clear();

    println!(
        "Indexed {} chunks at {}",
        report.chunks,
        settings.index_path.display()
    );
    println!(
        "  pages: {}  sections: {}  subsections: {}  recommendations: {} ({} urgent)",
        report.pages,
        report.sections,
        report.subsections,
        report.recommendations,
        report.urgent_recommendations
    );
    if !report.anomalies.is_empty() {
        println!("  {} outline anomalies detected:", report.anomalies.len());
        for anomaly in &report.anomalies {
            println!("    - {anomaly}");
        }
    }
    Ok(())
}

fn open_engine(settings: &Settings, timeout_ms: Option<u64>) -> anyhow::Result<RetrievalEngine> {
    let index = GuidelineIndex::open(&settings.index_path)?;
    let provider = provider_from_config(&settings.embedding)?;
    let mut engine = RetrievalEngine::new(Arc::new(index), provider)?;
    if let Some(ms) = timeout_ms {
        engine = engine.with_timeout(Duration::from_millis(ms));
    }
    Ok(engine)
}

fn run_query(
    settings: &Settings,
    text: &str,
    top_k: usize,
    timeout_ms: Option<u64>,
    json: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(settings, timeout_ms)?;
    let hits = engine.query_text(text, top_k)?;
    print_hits(&hits, &engine.index().meta().document_label, json)
}

fn run_symptoms(
    settings: &Settings,
    symptoms: Vec<String>,
    age: u32,
    gender: Gender,
    top_k: usize,
    json: bool,
) -> anyhow::Result<()> {
    let engine = open_engine(settings, None)?;
    let set: BTreeSet<String> = symptoms.into_iter().collect();
    let hits = engine.query_by_symptoms(&set, age, gender, top_k)?;
    print_hits(&hits, &engine.index().meta().document_label, json)
}

fn run_section(settings: &Settings, id: &str, json: bool) -> anyhow::Result<()> {
    let index = GuidelineIndex::open(&settings.index_path)?;
    let chunks = index.section_chunks(id)?;
    let label = index.meta().document_label.clone();
    print_chunks(&chunks, &label, json, &format!("No chunks in section {id}."))
}

fn run_urgent(settings: &Settings, top_k: usize, json: bool) -> anyhow::Result<()> {
    let index = GuidelineIndex::open(&settings.index_path)?;
    let chunks = index.urgent_chunks(top_k)?;
    let label = index.meta().document_label.clone();
    print_chunks(&chunks, &label, json, "No urgent recommendations indexed.")
}

fn run_stats(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let index = GuidelineIndex::open(&settings.index_path)?;
    let stats = index.statistics()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Document: {}", stats.document_label);
    println!("Chunks: {}", stats.total_chunks);
    println!(
        "Sections ({}): {}",
        stats.sections.len(),
        stats.sections.join(", ")
    );
    println!("Subsections: {}", stats.subsections.len());
    println!("Urgency tiers:");
    for (tier, count) in &stats.urgency_counts {
        println!("  {tier}: {count}");
    }
    println!(
        "Embedding: {} ({} dimensions)",
        stats.embedding_model, stats.embedding_dimensions
    );
    Ok(())
}

fn run_config(settings: &Settings) -> anyhow::Result<()> {
    println!("Current Configuration:");
    println!("{}", "=".repeat(50));
    print!("{}", settings.to_toml()?);
    Ok(())
}

fn print_hits(hits: &[SearchHit], label: &str, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(hits)?);
        return Ok(());
    }
    if hits.is_empty() {
        println!("No matches.");
        return Ok(());
    }
    for (rank, hit) in hits.iter().enumerate() {
        println!(
            "{:2}. {:.3}  {}  {}",
            rank + 1,
            hit.score,
            hit.chunk.citation(label),
            hit.chunk.preview(120).replace('\n', " ")
        );
    }
    Ok(())
}

fn print_chunks(chunks: &[Chunk], label: &str, json: bool, empty_message: &str) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(chunks)?);
        return Ok(());
    }
    if chunks.is_empty() {
        println!("{empty_message}");
        return Ok(());
    }
    for chunk in chunks {
        println!("{} [{}]", chunk.citation(label), chunk.urgency);
        for line in chunk.primary_text().lines() {
            println!("    {line}");
        }
    }
    Ok(())
}

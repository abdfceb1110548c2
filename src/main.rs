use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use docrank::config::{AppConfig, ExtractionSettings, DEFAULT_CONFIG_PATH};
use docrank::core::model::HeadingCandidate;
use docrank::parser::{MutoolParser, PdfReader};
use docrank::pipeline::{build_extractor, extract_candidates, Pipeline};
use docrank::rank::E5Embedder;

#[derive(Parser, Debug)]
#[command(name = "docrank")]
#[command(version, about = "Rank PDF sections against a persona's job using heading detection and sentence embeddings", long_about = None)]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true, env = "CONFIG_PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process one collection, or all of them
    Run {
        /// Collection name as written in the configuration
        #[arg(long, required_unless_present = "all", conflicts_with = "all")]
        collection: Option<String>,

        /// Process every configured collection, each into its own subfolder
        #[arg(long)]
        all: bool,
    },

    /// List configured collections
    List,

    /// Print the heading candidates of a PDF file
    Inspect {
        /// Input PDF file path
        input: PathBuf,
    },

    /// Show information about a PDF file
    Info {
        /// Input PDF file path
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run { collection, all } => run(&cli.config, collection.as_deref(), all).await,
        Commands::List => list_collections(&cli.config),
        Commands::Inspect { input } => inspect(&cli.config, &input).await,
        Commands::Info { input } => show_info(input),
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

async fn run(config_path: &Path, collection: Option<&str>, all: bool) -> Result<()> {
    let config = AppConfig::load(config_path)?;

    let selected: Vec<(&str, PathBuf)> = if all {
        config
            .collections
            .keys()
            .map(|name| (name.as_str(), config.output_settings.output_folder.join(name)))
            .collect()
    } else {
        let name = collection.context("no collection given")?;
        config.collection(name)?;
        vec![(name, config.output_settings.output_folder.clone())]
    };

    let embedding = &config.embedding;
    let embedder = E5Embedder::load(
        &embedding.model_id,
        embedding.model_dir.as_deref(),
        embedding.cache_dir.as_deref(),
    )
    .with_context(|| format!("failed to load embedding model {}", embedding.model_id))?;

    let mut pipeline = Pipeline::new(
        MutoolParser::default(),
        build_extractor(&config.extraction),
        embedder,
        config.extraction.word_budget(),
    );

    for (name, output_folder) in selected {
        let collection = config.collection(name)?;
        match pipeline
            .process_collection(name, collection, &config.output_settings, &output_folder)
            .await
        {
            Ok(summary) => {
                println!(
                    "[✓] {name}: {} section(s) from {}/{} document(s)",
                    summary.sections_found, summary.documents_with_sections, summary.documents
                );
                if let Some(path) = summary.output_path {
                    println!("    Output: {}", path.display());
                }
            }
            Err(err) => {
                tracing::error!(collection = name, error = %format!("{err:#}"), "collection failed");
            }
        }
    }
    Ok(())
}

fn list_collections(config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    println!("Collections");
    println!("===========");
    for (idx, (name, collection)) in config.collections.iter().enumerate() {
        println!("{}. {name}", idx + 1);
        println!("   Input:   {}", collection.input_folder.display());
        println!("   Persona: {}", collection.persona);
        println!("   Job:     {}", collection.job_to_be_done);
    }
    Ok(())
}

async fn inspect(config_path: &Path, input: &Path) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    // Without a configuration file the built-in thresholds apply.
    let settings = if config_path.exists() {
        AppConfig::load(config_path)?.extraction
    } else {
        ExtractionSettings::default()
    };
    let extractor = build_extractor(&settings);
    let (document, candidates) = extract_candidates(Arc::new(MutoolParser::default()), &extractor, input).await?;

    println!("{} ({} pages, {} candidates)", document.name, document.page_count(), candidates.len());
    for candidate in &candidates {
        println!("{}", describe_candidate(candidate));
    }
    Ok(())
}

fn describe_candidate(candidate: &HeadingCandidate) -> String {
    let reasons: Vec<&str> = candidate.reasons.iter().map(|reason| reason.label()).collect();
    format!(
        "p{:<3} y={:<7.1} {:<24} {:.2}  {}  [{}]",
        candidate.page_idx + 1,
        candidate.y,
        candidate.source.to_string(),
        candidate.confidence,
        candidate.text,
        reasons.join(", ")
    )
}

fn show_info(input: PathBuf) -> Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file does not exist: {}", input.display());
    }

    let reader = PdfReader::new(input.clone())
        .with_context(|| format!("Failed to open PDF: {}", input.display()))?;
    let page_count = reader.page_count()?;

    println!("PDF Information");
    println!("===============");
    println!("File: {}", input.display());
    println!("Pages: {}", page_count);

    Ok(())
}

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tama::{
    chunk_transcript, load_criteria_file, load_transcript, validate_session_name, write_session,
    AnalysisConfig, AnthropicClient, AnthropicConfig, ChunkerConfig, Orchestrator, SessionSummary,
    DEFAULT_MODEL,
};

#[derive(Parser)]
#[command(name = "tama")]
#[command(author, version, about = "Iterative LLM thematic analysis of interview transcripts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full generate / evaluate / refine session on a transcript
    Analyze {
        /// Input transcript file (UTF-8 text)
        #[arg(short, long)]
        input: PathBuf,

        /// Directory that receives the session folder
        #[arg(short, long, default_value = "outputs")]
        output_dir: PathBuf,

        /// Session name (defaults to a timestamped name)
        #[arg(long)]
        session_name: Option<String>,

        /// Model identifier
        #[arg(long, default_value = DEFAULT_MODEL)]
        model: String,

        /// Maximum refinement rounds (1-10)
        #[arg(long, default_value = "5")]
        max_iterations: u32,

        /// Average score that accepts the theme set (1.0-5.0)
        #[arg(long, default_value = "4.0")]
        threshold: f64,

        /// Maximum words per transcript chunk
        #[arg(long, default_value = "4000")]
        max_chunk_words: usize,

        /// Retries per model call on transient or malformed responses (0-5)
        #[arg(long, default_value = "1")]
        max_retries: u32,

        /// JSON file mapping criterion names to custom descriptions
        #[arg(long)]
        criteria: Option<PathBuf>,

        /// Only write the final results and summary
        #[arg(long)]
        no_intermediate: bool,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Chunk a transcript and print chunk statistics
    Chunk {
        /// Input transcript file (UTF-8 text)
        #[arg(short, long)]
        input: PathBuf,

        /// Maximum words per transcript chunk
        #[arg(long, default_value = "4000")]
        max_chunk_words: usize,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            input,
            output_dir,
            session_name,
            model,
            max_iterations,
            threshold,
            max_chunk_words,
            max_retries,
            criteria,
            no_intermediate,
            verbose,
        } => {
            setup_logging(verbose);

            let criteria_overrides = match criteria {
                Some(path) => load_criteria_file(&path)?,
                None => Default::default(),
            };
            let config = AnalysisConfig {
                model,
                max_iterations,
                acceptance_threshold: threshold,
                criteria_overrides,
                max_chunk_words,
                max_retries,
                ..Default::default()
            };

            analyze_transcript(input, output_dir, session_name, config, !no_intermediate).await
        }
        Commands::Chunk {
            input,
            max_chunk_words,
            verbose,
        } => {
            setup_logging(verbose);
            show_chunks(input, max_chunk_words)
        }
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

async fn analyze_transcript(
    input: PathBuf,
    output_dir: PathBuf,
    session_name: Option<String>,
    config: AnalysisConfig,
    save_intermediate: bool,
) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    if let Some(name) = &session_name {
        validate_session_name(name)?;
    }

    info!("Loading transcript from {:?}", input);
    let transcript = load_transcript(&input)?;

    let api_config = AnthropicConfig::from_env()?.with_model(config.model.clone());
    let client = AnthropicClient::new(api_config)?;

    let orchestrator =
        Orchestrator::new(Arc::new(client), config).context("Invalid configuration")?;
    let result = orchestrator
        .run_analysis(&transcript, session_name.as_deref())
        .await
        .context("Analysis session failed")?;

    let session_dir = write_session(&output_dir, &result, save_intermediate)?;

    println!("{}", SessionSummary::new(&result).format());
    println!("Session files saved in: {}", session_dir.display());

    Ok(())
}

fn show_chunks(input: PathBuf, max_chunk_words: usize) -> Result<()> {
    info!("Chunking transcript from {:?}", input);
    let transcript = load_transcript(&input)?;

    let chunks = chunk_transcript(
        &transcript,
        &ChunkerConfig {
            max_words: max_chunk_words,
        },
    )
    .context("Failed to chunk transcript")?;

    let total_words: usize = chunks.iter().map(|c| c.word_count).sum();

    println!("Transcript Chunks");
    println!("=================");
    println!("Total words: {}", total_words);
    println!("Max words per chunk: {}", max_chunk_words);
    println!("Chunks: {}", chunks.len());
    println!();

    for chunk in &chunks {
        let preview: Vec<&str> = chunk.text.split_whitespace().take(12).collect();
        println!(
            "Chunk {}: words {}-{} ({} words) \"{}...\"",
            chunk.chunk_id,
            chunk.start_word,
            chunk.end_word,
            chunk.word_count,
            preview.join(" ")
        );
    }

    Ok(())
}

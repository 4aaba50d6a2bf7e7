//! RAG command line
//!
//! Run with: cargo run -p rag-core --features cli --bin rag -- --help

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use rag_core::generation::OllamaLlm;
use rag_core::{Collaborators, RagConfig, RagPipeline};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rag", version, about = "Ingest documents and ask questions about them")]
struct Cli {
    /// TOML configuration file (defaults are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files into the index
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Show the closest fragments for a query
    Search {
        query: String,
        #[arg(short = 'k', long, default_value_t = 4)]
        top_k: usize,
    },
    /// Answer a question with the configured Ollama model
    Ask {
        question: String,
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rag_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RagConfig::from_file(path)?,
        None => RagConfig::default(),
    };

    tracing::info!("Configuration loaded");
    tracing::info!("  - Vector index: {}", config.vector_index.provider);
    tracing::info!(
        "  - Embeddings: {} ({}d)",
        config.embeddings.provider,
        config.embeddings.dimensions
    );
    tracing::info!(
        "  - Chunking: {} tokens, {} overlap",
        config.chunking.target_tokens,
        config.chunking.overlap_tokens
    );

    let pipeline = RagPipeline::from_config(&config, Collaborators::default())?;

    match cli.command {
        Command::Ingest { paths } => {
            if pipeline.index().name() != "disk" {
                tracing::warn!(
                    "Vector index '{}' is in memory; set vector_index.provider = \"disk\" to keep ingested files",
                    pipeline.index().name()
                );
            }
            let mut failed = 0usize;
            for path in &paths {
                match pipeline.ingest().index_file(path).await {
                    Ok(report) => println!(
                        "{}: {} fragments stored, {} failed, {} stale removed",
                        report.source,
                        report.fragment_ids.len(),
                        report.failures.len(),
                        report.stale_removed
                    ),
                    Err(e) => {
                        failed += 1;
                        eprintln!("{}: {}", path.display(), e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} files failed", failed, paths.len());
            }
        }
        Command::Search { query, top_k } => {
            let results = pipeline.search().query(&query, top_k).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, result) in results.iter().enumerate() {
                println!(
                    "[{}] {:.3}  {}\n{}\n",
                    i + 1,
                    result.score,
                    result.fragment.citation_label(),
                    result.fragment.text.trim()
                );
            }
        }
        Command::Ask { question, top_k } => {
            let llm = OllamaLlm::new(&config.llm)?;
            if !llm.client().health_check().await? {
                tracing::warn!("Ollama not available at {}", config.llm.base_url);
            }

            let mut options = pipeline.rag_options();
            if let Some(top_k) = top_k {
                options.top_k = top_k;
            }

            let response = pipeline.rag().answer(&question, &llm, &options).await?;

            println!("{}\n", response.answer);
            println!("Sources:");
            for (i, source) in response.sources.iter().enumerate() {
                println!("  [{}] {}", i + 1, source.citation_label());
            }
        }
    }

    Ok(())
}

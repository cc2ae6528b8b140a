//! Command-line entry point for manual pipeline exercise.

#![allow(clippy::print_stdout)]

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use deskrag::{Pipeline, PipelineConfig};

/// Deskrag: hybrid-search retrieval and ticket-agent pipeline.
#[derive(Parser, Debug)]
#[command(name = "deskrag")]
#[command(version, about, long_about = None)]
struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Retrieve a token-bounded context bundle for a query.
    Context {
        /// The question to retrieve context for.
        query: String,

        /// Token budget for the context bundle.
        #[arg(long, default_value_t = 2048)]
        max_tokens: usize,
    },

    /// Answer a ticket-system question through the tool-calling agent.
    Answer {
        /// The question to answer.
        query: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "deskrag=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env().context("failed to resolve configuration")?;
    let pipeline = Pipeline::from_config(&config).context("failed to build pipeline")?;

    match cli.command {
        Commands::Context { query, max_tokens } => {
            let bundle = pipeline.get_context(&query, max_tokens).await?;
            println!("tokens: {} (truncated: {})", bundle.token_count, bundle.truncated);
            println!(
                "chunks: {}/{} from {}",
                bundle.source.chunks_used, bundle.source.chunks_available, bundle.source.filename
            );
            println!("{}", bundle.output_text);
        }
        Commands::Answer { query } => {
            let answer = pipeline.answer_via_tools(&query).await?;
            println!("{answer}");
        }
    }

    Ok(())
}

//! Main entry point for the EPUB translator CLI

#![forbid(unsafe_code)]

use clap::Parser;
use dotenvy::dotenv;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use epub_translator::cli::commands::{self, Commands};

/// Translate EPUB books chapter by chapter with OpenAI, Azure OpenAI, Gemini or Ollama
#[derive(Parser, Debug)]
#[command(name = "epub-translator", version, about, long_about = None)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenv().ok();

    let args = Args::parse();

    // RUST_LOG takes precedence over --verbose
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("epub_translator={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let result = match args.command {
        Commands::ShowChapters { input, detailed } => {
            commands::handle_show_chapters(input, detailed).await
        }
        Commands::Translate(translate) => commands::handle_translate(translate).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

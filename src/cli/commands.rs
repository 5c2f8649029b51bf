//! CLI command definitions and handlers

use anyhow::Context;
use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::core::models::ProviderKind;

/// Commands for the EPUB translator
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the chapters of an EPUB
    ShowChapters {
        /// EPUB file to inspect
        #[arg(short, long)]
        input: PathBuf,

        /// Print a short text preview of each chapter
        #[arg(long)]
        detailed: bool,
    },

    /// Translate an EPUB chapter by chapter
    Translate(TranslateArgs),
}

/// Arguments of the `translate` command
#[derive(Args, Debug, Clone)]
pub struct TranslateArgs {
    /// Source EPUB
    #[arg(short, long)]
    pub input: PathBuf,

    /// Translated EPUB to write
    #[arg(short, long)]
    pub output: PathBuf,

    /// YAML file with provider settings
    #[arg(short, long)]
    pub config: PathBuf,

    /// Source language
    #[arg(long, default_value = "EN")]
    pub from_lang: String,

    /// Target language
    #[arg(long, default_value = "PL")]
    pub to_lang: String,

    /// LLM backend to use
    #[arg(long, value_enum)]
    pub llm_provider: ProviderKind,

    /// First chapter to translate (1-based)
    #[arg(long)]
    pub from_chapter: Option<usize>,

    /// Last chapter to translate (inclusive)
    #[arg(long)]
    pub to_chapter: Option<usize>,

    /// Checkpoint file (default: <output>.progress.json)
    #[arg(long)]
    pub progress_file: Option<PathBuf>,

    /// Maximum characters per request
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Attempts per request before giving up
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// Extra instructions appended to the system prompt
    #[arg(long)]
    pub extra_prompts: Option<String>,

    /// Do not write <output>.partial after each chapter
    #[arg(long)]
    pub no_partial: bool,
}

/// Handle show-chapters command
pub async fn handle_show_chapters(input: PathBuf, detailed: bool) -> anyhow::Result<()> {
    use crate::processors::book::EpubBook;
    use crate::processors::html::{preview, PREVIEW_CHARS};

    let book = EpubBook::open(&input).with_context(|| format!("Cannot read {}", input.display()))?;

    println!("📚 {}", book.title().unwrap_or("Untitled"));
    println!("   {} chapters\n", book.len());

    for chapter in book.chapters() {
        println!(
            "▶️  Chapter {}/{}: {} ({} characters, ~{} tokens)",
            chapter.index,
            book.len(),
            chapter.title,
            chapter.char_count(),
            chapter.approx_tokens()
        );
        if detailed {
            println!("{}\n", preview(&chapter.content, PREVIEW_CHARS));
        }
    }

    println!("\nTotal characters in the book: {}", book.total_chars());
    Ok(())
}

/// Handle translate command
pub async fn handle_translate(args: TranslateArgs) -> anyhow::Result<()> {
    use crate::core::client::{AsyncTranslator, RetryPolicy};
    use crate::core::config::AppConfig;
    use crate::core::providers::create_provider;
    use crate::processors::epub::{EpubProcessor, TranslateOptions};
    use indicatif::{ProgressBar, ProgressStyle};
    use tracing::info;

    if args.input == args.output {
        anyhow::bail!("--output must differ from --input");
    }

    let mut config = AppConfig::load(&args.config)?;
    if let Some(chunk_size) = args.chunk_size {
        config.translation.chunk_size = chunk_size;
    }
    if let Some(max_retries) = args.max_retries {
        config.translation.max_attempts = max_retries;
    }
    if let Some(extra) = args.extra_prompts.clone() {
        config.translation.extra_prompts = extra;
    }
    config.translation.validate()?;

    let provider = create_provider(args.llm_provider, &config)?;
    let translator = AsyncTranslator::new(provider, RetryPolicy::from_settings(&config.translation))
        .with_extra_prompts(config.translation.extra_prompts.clone());

    info!("Input: {}", args.input.display());
    info!("Output: {}", args.output.display());

    // Create progress bar
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("=>-"),
    );

    let processor = EpubProcessor::new(translator).with_progress_bar(pb);
    let options = TranslateOptions {
        from_lang: args.from_lang.clone(),
        to_lang: args.to_lang.clone(),
        from_chapter: args.from_chapter,
        to_chapter: args.to_chapter,
        chunk_size: config.translation.chunk_size,
        progress_file: args.progress_file.clone(),
        write_partial: !args.no_partial,
    };

    println!(
        "📖 Translating {} ({} -> {}) with {}",
        args.input.display(),
        args.from_lang,
        args.to_lang,
        args.llm_provider
    );

    let summary = processor
        .translate_epub(&args.input, &args.output, &options)
        .await
        .with_context(|| format!("Translation of {} failed", args.input.display()))?;

    println!("\n✅ Translation completed!");
    if let Some(title) = &summary.book_title {
        println!("   Book: {}", title);
    }
    println!(
        "   Chapters: {}-{} of {}",
        summary.range.from, summary.range.to, summary.total_chapters
    );
    println!("   Translated: {}", summary.translated);
    println!("   Resumed: {}", summary.resumed);
    println!("   Output: {}", summary.output.display());
    println!("   Progress file: {}", summary.progress_file.display());
    println!("   Time: {:?}", summary.elapsed);

    Ok(())
}

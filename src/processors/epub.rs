//! Chapter-by-chapter EPUB translation with resumable progress

use indicatif::ProgressBar;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::core::client::AsyncTranslator;
use crate::core::errors::{Result, TranslationError};
use crate::core::progress::{ProgressStore, RunInfo};
use crate::processors::book::{Chapter, EpubBook};
use crate::processors::{chunker, html};

/// Inclusive, 1-based chapter bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterRange {
    pub from: usize,
    pub to: usize,
}

impl ChapterRange {
    /// Resolve optional bounds against a book of `total` chapters.
    ///
    /// Missing bounds cover the whole book and `to` is clamped to `total`.
    pub fn resolve(from: Option<usize>, to: Option<usize>, total: usize) -> Result<Self> {
        if total == 0 {
            return Err(TranslationError::config("The book has no chapters to translate"));
        }
        let from = from.unwrap_or(1);
        if from == 0 {
            return Err(TranslationError::config("Chapters are numbered from 1"));
        }
        if from > total {
            return Err(TranslationError::config(format!(
                "--from-chapter {} is beyond the last chapter ({})",
                from, total
            )));
        }
        let to = to.unwrap_or(total).min(total);
        if from > to {
            return Err(TranslationError::config(format!(
                "--from-chapter {} is after --to-chapter {}",
                from, to
            )));
        }
        Ok(Self { from, to })
    }

    pub fn contains(&self, index: usize) -> bool {
        (self.from..=self.to).contains(&index)
    }

    pub fn len(&self) -> usize {
        self.to - self.from + 1
    }
}

/// Per-run options
#[derive(Debug, Clone)]
pub struct TranslateOptions {
    pub from_lang: String,
    pub to_lang: String,
    pub from_chapter: Option<usize>,
    pub to_chapter: Option<usize>,
    /// Maximum characters per provider call
    pub chunk_size: usize,
    /// Defaults to `<output>.progress.json`
    pub progress_file: Option<PathBuf>,
    /// Refresh `<output>.partial` after every chapter
    pub write_partial: bool,
}

impl Default for TranslateOptions {
    fn default() -> Self {
        Self {
            from_lang: "EN".to_string(),
            to_lang: "PL".to_string(),
            from_chapter: None,
            to_chapter: None,
            chunk_size: 20_000,
            progress_file: None,
            write_partial: true,
        }
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone)]
pub struct TranslationSummary {
    pub book_title: Option<String>,
    pub total_chapters: usize,
    pub range: ChapterRange,
    /// Chapters sent to the provider in this run
    pub translated: usize,
    /// Chapters taken from the progress file
    pub resumed: usize,
    pub output: PathBuf,
    pub progress_file: PathBuf,
    pub elapsed: Duration,
}

/// `<output>.progress.json`
pub fn default_progress_path(output: &Path) -> PathBuf {
    with_suffix(output, ".progress.json")
}

/// `<output>.partial`
pub fn partial_path(output: &Path) -> PathBuf {
    with_suffix(output, ".partial")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// EPUB translation pipeline
#[derive(Clone)]
pub struct EpubProcessor {
    translator: AsyncTranslator,
    progress_bar: ProgressBar,
}

impl std::fmt::Debug for EpubProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EpubProcessor")
            .field("translator", &self.translator)
            .finish()
    }
}

impl EpubProcessor {
    /// Create a new EPUB processor
    pub fn new(translator: AsyncTranslator) -> Self {
        Self {
            translator,
            progress_bar: ProgressBar::hidden(),
        }
    }

    /// Report chapter progress on `bar`
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.progress_bar = bar;
        self
    }

    pub fn translator(&self) -> &AsyncTranslator {
        &self.translator
    }

    /// Translate `input` into `output`, resuming from the progress file when possible
    pub async fn translate_epub(
        &self,
        input: &Path,
        output: &Path,
        options: &TranslateOptions,
    ) -> Result<TranslationSummary> {
        let start = Instant::now();
        let book = EpubBook::open(input)?;
        let range = ChapterRange::resolve(options.from_chapter, options.to_chapter, book.len())?;

        let progress_file = options
            .progress_file
            .clone()
            .unwrap_or_else(|| default_progress_path(output));
        let run = RunInfo {
            input: input
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| input.display().to_string()),
            from_lang: options.from_lang.clone(),
            to_lang: options.to_lang.clone(),
            provider: self.translator.provider_name().to_string(),
            from_chapter: range.from,
            to_chapter: range.to,
            total_chapters: book.len(),
        };
        let mut store = ProgressStore::open(&progress_file, &run).await?;

        info!(
            "Translating {} chapters {}-{} of {} ({} -> {}, {} / {})",
            input.display(),
            range.from,
            range.to,
            book.len(),
            options.from_lang,
            options.to_lang,
            self.translator.provider_name(),
            self.translator.model()
        );

        let language = options.to_lang.to_lowercase();
        let partial = partial_path(output);
        let mut translated = 0;
        let mut resumed = 0;

        self.progress_bar.set_length(range.len() as u64);

        for chapter in book.chapters().iter().filter(|c| range.contains(c.index)) {
            self.progress_bar.set_message(chapter.title.clone());

            if store.is_completed(chapter.index) {
                debug!("Chapter {} already translated, skipping", chapter.index);
                resumed += 1;
                self.progress_bar.inc(1);
                continue;
            }

            info!(
                "Chapter {}/{}: {} ({} chars)",
                chapter.index,
                book.len(),
                chapter.title,
                chapter.char_count()
            );

            let step = async {
                let content = self
                    .translate_chapter(chapter, &options.from_lang, &options.to_lang, options.chunk_size)
                    .await?;
                store
                    .complete_chapter(chapter.index, chapter.title.as_str(), content)
                    .await?;
                if options.write_partial {
                    book.write(&partial, &store.translated_contents(), Some(language.as_str()))?;
                    debug!("Updated {}", partial.display());
                }
                Ok::<(), TranslationError>(())
            };
            if let Err(e) = step.await {
                error!(
                    "Translation stopped at chapter {}: {}. Progress is kept in {}; run the same command again to resume",
                    chapter.index,
                    e,
                    progress_file.display()
                );
                self.progress_bar.abandon();
                return Err(e);
            }
            translated += 1;

            self.progress_bar.inc(1);
        }

        let contents: BTreeMap<usize, String> = store.translated_contents();
        let finished = async {
            book.write(output, &contents, Some(language.as_str()))?;
            remove_if_exists(&partial).await
        };
        if let Err(e) = finished.await {
            error!("Could not write {}: {}", output.display(), e);
            self.progress_bar.abandon();
            return Err(e);
        }

        self.progress_bar.finish_and_clear();
        info!(
            "Wrote {} ({} chapters translated, {} resumed)",
            output.display(),
            translated,
            resumed
        );

        Ok(TranslationSummary {
            book_title: book.title().map(str::to_string),
            total_chapters: book.len(),
            range,
            translated,
            resumed,
            output: output.to_path_buf(),
            progress_file,
            elapsed: start.elapsed(),
        })
    }

    /// Translate the body of one chapter, keeping its head and markup around it
    pub async fn translate_chapter(
        &self,
        chapter: &Chapter,
        from_lang: &str,
        to_lang: &str,
        chunk_size: usize,
    ) -> Result<String> {
        let parts = html::split_body(&chapter.content);
        let chunks = chunker::chunk_html(parts.body, chunk_size);

        let mut body = String::with_capacity(parts.body.len());
        for (i, chunk) in chunks.iter().enumerate() {
            if chunk.trim().is_empty() {
                body.push_str(chunk);
                continue;
            }
            debug!(
                "Chapter {} chunk {}/{} ({} chars)",
                chapter.index,
                i + 1,
                chunks.len(),
                chunk.chars().count()
            );

            let translated = self.translator.translate_text(chunk, from_lang, to_lang).await?;

            // Models trim surrounding whitespace; put the original back
            let trimmed_start = chunk.trim_start();
            body.push_str(&chunk[..chunk.len() - trimmed_start.len()]);
            body.push_str(&translated);
            body.push_str(&chunk[chunk.trim_end().len()..]);
        }

        Ok(parts.with_body(&body))
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

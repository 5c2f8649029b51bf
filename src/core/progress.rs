//! Resumable translation progress
//!
//! The progress file is a JSON checkpoint holding every translated chapter of
//! the current run. It is rewritten after each chapter through a temporary
//! file and a rename, so an interrupted run never leaves a half-written file.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::core::errors::{Result, TranslationError};

/// Bumped whenever the file layout changes incompatibly
pub const PROGRESS_VERSION: u32 = 1;

/// One translated chapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub title: String,
    /// Complete translated XHTML document
    pub content: String,
    pub translated_at: DateTime<Utc>,
}

/// What the current run is translating
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunInfo {
    /// File name of the source EPUB
    pub input: String,
    pub from_lang: String,
    pub to_lang: String,
    pub provider: String,
    pub from_chapter: usize,
    pub to_chapter: usize,
    pub total_chapters: usize,
}

/// On-disk checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub version: u32,
    pub input: String,
    pub from_lang: String,
    pub to_lang: String,
    pub provider: String,
    pub from_chapter: usize,
    pub to_chapter: usize,
    pub total_chapters: usize,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Chapter index (1-based) to translation
    pub chapters: BTreeMap<usize, ChapterEntry>,
}

impl ProgressRecord {
    pub fn new(info: &RunInfo) -> Self {
        let now = Utc::now();
        Self {
            version: PROGRESS_VERSION,
            input: info.input.clone(),
            from_lang: info.from_lang.clone(),
            to_lang: info.to_lang.clone(),
            provider: info.provider.clone(),
            from_chapter: info.from_chapter,
            to_chapter: info.to_chapter,
            total_chapters: info.total_chapters,
            started_at: now,
            updated_at: now,
            chapters: BTreeMap::new(),
        }
    }

    /// Whether this checkpoint belongs to the same book and language pair
    pub fn is_compatible_with(&self, info: &RunInfo) -> bool {
        self.version == PROGRESS_VERSION
            && self.input == info.input
            && self.from_lang.eq_ignore_ascii_case(&info.from_lang)
            && self.to_lang.eq_ignore_ascii_case(&info.to_lang)
            && self.total_chapters == info.total_chapters
    }
}

/// Progress file plus its in-memory record
#[derive(Debug)]
pub struct ProgressStore {
    path: PathBuf,
    record: ProgressRecord,
    resumed: usize,
}

impl ProgressStore {
    /// Load the checkpoint at `path` when it matches `info`, else start a fresh one
    pub async fn open(path: impl Into<PathBuf>, info: &RunInfo) -> Result<Self> {
        let path = path.into();

        let record = match Self::read(&path).await? {
            Some(mut existing) if existing.is_compatible_with(info) => {
                existing.provider = info.provider.clone();
                existing.from_chapter = info.from_chapter;
                existing.to_chapter = info.to_chapter;
                info!(
                    "Resuming from {} ({} chapters already translated)",
                    path.display(),
                    existing.chapters.len()
                );
                existing
            }
            Some(existing) => {
                warn!(
                    "Progress file {} belongs to {} ({} -> {}), starting fresh",
                    path.display(),
                    existing.input,
                    existing.from_lang,
                    existing.to_lang
                );
                ProgressRecord::new(info)
            }
            None => ProgressRecord::new(info),
        };

        let resumed = record.chapters.len();
        Ok(Self {
            path,
            record,
            resumed,
        })
    }

    async fn read(path: &Path) -> Result<Option<ProgressRecord>> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(None);
        }
        let content = tokio::fs::read_to_string(path).await?;
        let record = serde_json::from_str(&content).map_err(|e| TranslationError::ProgressError {
            message: format!(
                "{} is not a valid progress file ({}); remove it or pass another --progress-file",
                path.display(),
                e
            ),
        })?;
        Ok(Some(record))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &ProgressRecord {
        &self.record
    }

    /// Chapters that were already present when the store was opened
    pub fn resumed_count(&self) -> usize {
        self.resumed
    }

    pub fn len(&self) -> usize {
        self.record.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.chapters.is_empty()
    }

    pub fn is_completed(&self, index: usize) -> bool {
        self.record.chapters.contains_key(&index)
    }

    pub fn get(&self, index: usize) -> Option<&ChapterEntry> {
        self.record.chapters.get(&index)
    }

    /// Translated documents keyed by chapter index
    pub fn translated_contents(&self) -> BTreeMap<usize, String> {
        self.record
            .chapters
            .iter()
            .map(|(index, entry)| (*index, entry.content.clone()))
            .collect()
    }

    /// Store a finished chapter and flush the file immediately
    pub async fn complete_chapter(
        &mut self,
        index: usize,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<()> {
        let now = Utc::now();
        self.record.chapters.insert(
            index,
            ChapterEntry {
                title: title.into(),
                content: content.into(),
                translated_at: now,
            },
        );
        self.record.updated_at = now;
        self.save().await
    }

    /// Write the checkpoint atomically
    pub async fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let json = serde_json::to_string_pretty(&self.record)?;
        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| TranslationError::FileError {
                path: tmp.display().to_string(),
                message: e.to_string(),
            })?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            "Saved progress ({} chapters) to {}",
            self.record.chapters.len(),
            self.path.display()
        );
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

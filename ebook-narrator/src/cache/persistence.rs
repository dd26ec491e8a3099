//! Cache persistence: saving, loading, and managing cached books.

use super::types::{CacheMetadata, CacheSummary, ChapterRecord, SourceFingerprint};
use crate::book::{Book, Chapter};
use crate::error::{NarratorError, Result};
use crate::text::normalizer::{chapter_file_name, sanitize_filename};
use chrono::{TimeDelta, Utc};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

pub const METADATA_FILE: &str = "metadata.json";

const BLOB_EXTENSION: &str = "txt";
const DEFAULT_MAX_FILENAME_LENGTH: usize = 120;

/// Reads and writes cached books under a base directory.
#[derive(Debug, Clone)]
pub struct CacheManager {
    base_dir: PathBuf,
    max_filename_length: usize,
}

impl CacheManager {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_filename_length: DEFAULT_MAX_FILENAME_LENGTH,
        }
    }

    pub fn with_max_filename_length(mut self, max_len: usize) -> Self {
        self.max_filename_length = max_len.max(1);
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Cache directory for a book, keyed by its sanitized title.
    pub fn book_dir(&self, book_title: &str) -> PathBuf {
        self.base_dir
            .join(sanitize_filename(book_title, self.max_filename_length))
    }

    /// Write every chapter blob plus the metadata record under `key`.
    ///
    /// The record keeps the book's own title and author, plus the
    /// fingerprint of the document it came from. Blobs left over from an
    /// earlier save under the same key are removed first.
    pub fn save(&self, key: &str, book: &Book, source: Option<SourceFingerprint>) -> Result<PathBuf> {
        let mut metadata = CacheMetadata::new(book.title.clone(), Vec::new());
        metadata.author = book.author.clone();
        metadata.source = source;
        self.write_entry(key, metadata, &book.chapters)
    }

    fn write_entry(
        &self,
        key: &str,
        mut metadata: CacheMetadata,
        chapters: &[Chapter],
    ) -> Result<PathBuf> {
        let dir = self.book_dir(key);
        fs::create_dir_all(&dir)?;

        let removed = remove_blobs(&dir)?;
        if removed > 0 {
            log::debug!("Removed {} stale cache files from {}", removed, dir.display());
        }

        let total = chapters.len();
        let mut records = Vec::with_capacity(total);
        for chapter in chapters {
            let txt_file = chapter_file_name(
                chapter.index,
                total,
                &chapter.title,
                BLOB_EXTENSION,
                self.max_filename_length,
            );
            fs::write(dir.join(&txt_file), &chapter.text)?;

            records.push(ChapterRecord {
                index: chapter.index,
                title: chapter.title.clone(),
                txt_file,
                char_count: chapter.char_count(),
            });
        }

        metadata.total_chapters = records.len();
        metadata.chapters = records;
        let writer = BufWriter::new(File::create(dir.join(METADATA_FILE))?);
        serde_json::to_writer_pretty(writer, &metadata)?;

        log::info!("Cached {} chapters in {}", total, dir.display());
        Ok(dir)
    }

    /// Load a cached book saved with [`CacheManager::save`].
    ///
    /// With `source` given, an entry recorded for a different (or unknown)
    /// document fingerprint is rejected with [`NarratorError::SourceChanged`].
    pub fn load_book(&self, dir: &Path, source: Option<&SourceFingerprint>) -> Result<Book> {
        let (metadata, chapters) = self.load(dir)?;
        if let Some(expected) = source {
            if metadata.source.as_ref() != Some(expected) {
                return Err(NarratorError::SourceChanged(dir.to_path_buf()));
            }
        }
        Ok(Book::new(metadata.title, metadata.author, chapters))
    }

    /// Read a cache directory back into chapters.
    ///
    /// Every blob the metadata references is checked before any is read;
    /// all missing names are reported together.
    pub fn load(&self, dir: &Path) -> Result<(CacheMetadata, Vec<Chapter>)> {
        let metadata = read_metadata(dir)?;

        let missing: Vec<String> = metadata
            .chapters
            .iter()
            .filter(|record| !dir.join(&record.txt_file).is_file())
            .map(|record| record.txt_file.clone())
            .collect();

        if !missing.is_empty() {
            return Err(NarratorError::MissingBlobs { missing });
        }

        let chapters = metadata
            .chapters
            .iter()
            .map(|record| {
                Ok(Chapter {
                    index: record.index,
                    title: record.title.clone(),
                    text: fs::read_to_string(dir.join(&record.txt_file))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok((metadata, chapters))
    }

    /// The cache directory for a book, if one has been saved.
    pub fn find(&self, book_title: &str) -> Option<PathBuf> {
        let dir = self.book_dir(book_title);
        dir.join(METADATA_FILE).is_file().then_some(dir)
    }

    /// Remove a book's cache entry. Returns whether one existed.
    pub fn delete(&self, book_title: &str) -> Result<bool> {
        let dir = self.book_dir(book_title);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)?;
        log::info!("Removed cache {}", dir.display());
        Ok(true)
    }

    /// Every readable cache entry, sorted by title.
    pub fn list(&self) -> Result<Vec<CacheSummary>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let dir = entry?.path();
            if !dir.is_dir() {
                continue;
            }

            match read_metadata(&dir) {
                Ok(metadata) => summaries.push(CacheSummary {
                    chars: metadata.total_chars(),
                    title: metadata.title,
                    chapters: metadata.total_chapters,
                    size_mb: dir_size(&dir)? as f64 / (1024.0 * 1024.0),
                    created_at: metadata.created_at,
                    dir,
                }),
                Err(e) => log::debug!("Ignoring {}: {}", dir.display(), e),
            }
        }

        summaries.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(summaries)
    }

    /// Remove cache entries written more than `days` days ago. Returns how
    /// many were removed.
    pub fn cleanup_older_than(&self, days: i64) -> Result<usize> {
        let cutoff = TimeDelta::try_days(days)
            .and_then(|age| Utc::now().checked_sub_signed(age))
            .ok_or(NarratorError::InvalidAge(days))?;
        let mut removed = 0;

        for summary in self.list()? {
            if summary.created_at < cutoff {
                fs::remove_dir_all(&summary.dir)?;
                log::info!("Removed expired cache {}", summary.dir.display());
                removed += 1;
            }
        }

        Ok(removed)
    }
}

fn read_metadata(dir: &Path) -> Result<CacheMetadata> {
    let path = dir.join(METADATA_FILE);
    if !path.is_file() {
        return Err(NarratorError::CacheNotFound(dir.to_path_buf()));
    }
    let reader = BufReader::new(File::open(&path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Delete every chapter blob in `dir`.
fn remove_blobs(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == BLOB_EXTENSION) {
            fs::remove_file(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn dir_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(dir)? {
        let metadata = entry?.metadata()?;
        if metadata.is_file() {
            total += metadata.len();
        }
    }
    Ok(total)
}

//! Cache record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Size and modification time of the document a cache entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFingerprint {
    pub size: u64,
    /// Seconds since the Unix epoch, when the filesystem reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
}

impl SourceFingerprint {
    pub fn of(path: &Path) -> std::io::Result<Self> {
        let metadata = std::fs::metadata(path)?;
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .and_then(|d| i64::try_from(d.as_secs()).ok());
        Ok(Self {
            size: metadata.len(),
            modified,
        })
    }
}

/// Metadata for one cached chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    /// 1-based chapter index
    pub index: usize,
    pub title: String,
    /// Blob file name, relative to the cache directory
    pub txt_file: String,
    pub char_count: usize,
}

/// The metadata record of a cached book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    pub total_chapters: usize,
    /// The document the chapters were extracted from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceFingerprint>,
    /// Chapter records in reading order
    pub chapters: Vec<ChapterRecord>,
    /// When the cache entry was written
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl CacheMetadata {
    pub fn new(title: impl Into<String>, chapters: Vec<ChapterRecord>) -> Self {
        Self {
            title: title.into(),
            author: None,
            source: None,
            total_chapters: chapters.len(),
            chapters,
            created_at: Utc::now(),
        }
    }

    pub fn total_chars(&self) -> usize {
        self.chapters.iter().map(|c| c.char_count).sum()
    }
}

/// One line of `cache list` output.
#[derive(Debug, Clone)]
pub struct CacheSummary {
    pub title: String,
    pub chapters: usize,
    pub chars: usize,
    pub dir: PathBuf,
    pub size_mb: f64,
    pub created_at: DateTime<Utc>,
}

//! Structural extraction of chapters from ebook containers.

pub mod epub;
pub mod patterns;
pub mod pdf;

pub use epub::EpubExtractor;
pub use patterns::{ExtractionPatterns, PatternTable};
pub use pdf::PdfExtractor;

use crate::error::{NarratorError, Result};
use std::path::Path;

/// A chapter as it leaves an extractor: normalized text, title if one
/// was recovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChapter {
    pub title: Option<String>,
    pub text: String,
}

impl RawChapter {
    pub fn new(title: Option<String>, text: impl Into<String>) -> Self {
        Self {
            title,
            text: text.into(),
        }
    }
}

/// Everything an extractor recovers from one document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedBook {
    pub title: Option<String>,
    pub author: Option<String>,
    /// Chapters in reading order
    pub chapters: Vec<RawChapter>,
}

/// Turns the raw bytes of one document format into chapters.
pub trait DocumentExtractor {
    /// Short format name used in errors and logs
    fn format(&self) -> &'static str;

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedBook>;
}

/// Supported container formats, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Epub,
    Pdf,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "epub" => Ok(Self::Epub),
            "pdf" => Ok(Self::Pdf),
            _ if ext.is_empty() => Err(NarratorError::UnsupportedFormat("(none)".to_string())),
            _ => Err(NarratorError::UnsupportedFormat(format!(".{ext}"))),
        }
    }

    /// The extractor for this format, configured with `patterns`.
    pub fn extractor(self, patterns: ExtractionPatterns) -> Box<dyn DocumentExtractor> {
        match self {
            Self::Epub => Box::new(EpubExtractor::new(patterns)),
            Self::Pdf => Box::new(PdfExtractor::new(patterns)),
        }
    }
}

//! Chapter assembly: stable indices and titles over extracted chapters.

use crate::error::{NarratorError, Result};
use crate::extract::{DocumentKind, ExtractionPatterns, RawChapter};
use std::fs;
use std::path::Path;

/// Narration speed used for time estimates.
pub const CHARS_PER_MINUTE: usize = 1000;

/// A chapter ready for caching and synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    /// 1-based position in reading order
    pub index: usize,
    pub title: String,
    /// Normalized text with pause markers
    pub text: String,
}

impl Chapter {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// A parsed ebook.
#[derive(Debug, Clone)]
pub struct Book {
    pub title: String,
    pub author: Option<String>,
    /// Chapters in reading order
    pub chapters: Vec<Chapter>,
}

impl Book {
    pub fn new(title: impl Into<String>, author: Option<String>, chapters: Vec<Chapter>) -> Self {
        Self {
            title: title.into(),
            author,
            chapters,
        }
    }

    pub fn total_char_count(&self) -> usize {
        self.chapters.iter().map(Chapter::char_count).sum()
    }

    pub fn total_chapter_count(&self) -> usize {
        self.chapters.len()
    }

    /// Total word count across all chapters (approximate)
    pub fn total_words(&self) -> usize {
        self.chapters
            .iter()
            .map(|c| c.text.split_whitespace().count())
            .sum()
    }

    pub fn estimated_minutes(&self) -> f64 {
        estimate_minutes(self.total_char_count())
    }
}

/// Number chapters from 1 in extraction order, naming untitled ones
/// `"Chapter {index}"`.
pub fn assemble_chapters(raw: Vec<RawChapter>) -> Vec<Chapter> {
    raw.into_iter()
        .enumerate()
        .map(|(i, chapter)| {
            let index = i + 1;
            let title = chapter
                .title
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| format!("Chapter {}", index));
            Chapter {
                index,
                title,
                text: chapter.text,
            }
        })
        .collect()
}

/// Read and extract an ebook from disk.
///
/// The book title falls back to the file stem when the container carries
/// none. A document with no surviving chapters is an error.
pub fn load_book(path: &Path, patterns: ExtractionPatterns) -> Result<Book> {
    let kind = DocumentKind::from_path(path)?;
    let bytes = fs::read(path)?;
    let extractor = kind.extractor(patterns);

    log::info!("Reading {} file: {}", extractor.format(), path.display());
    let extracted = extractor.extract(&bytes)?;

    if extracted.chapters.is_empty() {
        return Err(NarratorError::NoChapters);
    }

    let title = extracted
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| {
            path.file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "Untitled".to_string())
        });

    Ok(Book::new(title, extracted.author, assemble_chapters(extracted.chapters)))
}

/// Minutes of narration for `chars` characters.
pub fn estimate_minutes(chars: usize) -> f64 {
    chars as f64 / CHARS_PER_MINUTE as f64
}

/// Render seconds as `"1h 05m"`, `"12m 30s"`, or `"45s"`.
pub fn format_duration(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn raw(title: Option<&str>, text: &str) -> RawChapter {
        RawChapter::new(title.map(str::to_string), text)
    }

    #[test]
    fn test_assemble_assigns_indices_and_titles() {
        let chapters = assemble_chapters(vec![
            raw(Some("Prologue"), "first"),
            raw(None, "second"),
            raw(Some("   "), "third"),
        ]);

        let summary: Vec<(usize, &str)> = chapters.iter().map(|c| (c.index, c.title.as_str())).collect();
        assert_eq!(summary, vec![(1, "Prologue"), (2, "Chapter 2"), (3, "Chapter 3")]);
        assert_eq!(chapters[2].text, "third");
    }

    #[test]
    fn test_fallback_titles_follow_emission_order() {
        let chapters = assemble_chapters(vec![raw(None, "a"), raw(None, "b"), raw(None, "c")]);
        let titles: Vec<&str> = chapters.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["Chapter 1", "Chapter 2", "Chapter 3"]);
    }

    #[test]
    fn test_aggregates() {
        let book = Book::new(
            "Test",
            None,
            assemble_chapters(vec![raw(None, "olá mundo"), raw(None, "three more words")]),
        );
        assert_eq!(book.total_chapter_count(), 2);
        assert_eq!(book.total_char_count(), 9 + 16);
        assert_eq!(book.total_words(), 5);
    }

    #[test]
    fn test_estimate_minutes() {
        assert_eq!(estimate_minutes(0), 0.0);
        assert_eq!(estimate_minutes(2500), 2.5);
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(45), "45s");
        assert_eq!(format_duration(750), "12m 30s");
        assert_eq!(format_duration(3900), "1h 05m");
    }

    #[test]
    fn test_load_book_rejects_unknown_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "plain text").unwrap();

        let err = load_book(&path, ExtractionPatterns::builtin().unwrap()).unwrap_err();
        assert!(matches!(err, NarratorError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_load_book_missing_file() {
        let err = load_book(Path::new("/nonexistent/book.epub"), ExtractionPatterns::builtin().unwrap())
            .unwrap_err();
        assert!(matches!(err, NarratorError::Io(_)));
    }
}

//! PDF extraction: splits the page stream into chapters at detected
//! headings and inserts pauses from line layout.

use super::patterns::{ExtractionPatterns, starts_uppercase};
use super::{DocumentExtractor, ExtractedBook, RawChapter};
use crate::error::{NarratorError, Result};
use crate::text::PAUSE_MARKER;
use crate::text::normalizer::{clean_text, collapse_pauses};
use once_cell::sync::Lazy;
use pdf_extract::{Document, PlainTextOutput};
use regex::Regex;
use std::panic::{self, AssertUnwindSafe};

/// Chapters with this many characters or fewer are dropped.
pub const MIN_CHAPTER_CHARS: usize = 100;
/// Pages with fewer characters than this carry no content (page numbers,
/// running headers).
pub const MIN_PAGE_CHARS: usize = 50;
/// Pages accumulated without a heading before the buffer is flushed.
pub const FORCED_FLUSH_PAGES: usize = 10;
/// Pages per chapter when heading detection finds nothing.
pub const FALLBACK_PAGES_PER_CHAPTER: usize = 20;
/// Leading non-empty lines of a page searched for a chapter heading.
const HEADING_SCAN_LINES: usize = 5;

static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").expect("valid regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n\s*\n+").expect("valid regex"));
static NEWLINE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").expect("valid regex"));

pub struct PdfExtractor {
    patterns: ExtractionPatterns,
}

/// Pages gathered for the chapter being built.
#[derive(Default)]
struct PageBuffer {
    pages: Vec<String>,
    first_page: usize,
    last_page: usize,
    title: Option<String>,
}

impl PageBuffer {
    fn push(&mut self, page_number: usize, text: String) {
        if self.pages.is_empty() {
            self.first_page = page_number;
        }
        self.last_page = page_number;
        self.pages.push(text);
    }

    fn range_title(&self) -> String {
        format!("Pages {}-{}", self.first_page, self.last_page)
    }

    /// Emit the buffered pages as a chapter if long enough, then reset.
    fn flush(&mut self, title: Option<String>, chapters: &mut Vec<RawChapter>) {
        if self.pages.is_empty() {
            return;
        }

        let text = join_pages(&self.pages);
        let len = text.chars().count();
        if len > MIN_CHAPTER_CHARS {
            chapters.push(RawChapter::new(title, text));
        } else {
            log::debug!(
                "Dropping pages {}-{} ({} characters)",
                self.first_page,
                self.last_page,
                len
            );
        }

        *self = Self::default();
    }
}

impl PdfExtractor {
    pub fn new(patterns: ExtractionPatterns) -> Self {
        Self { patterns }
    }

    /// Chapters from page texts in document order.
    ///
    /// Headings drive the split; when none produce a chapter, pages are
    /// grouped in fixed-size runs instead.
    pub fn chapters_from_pages(&self, pages: &[String]) -> Vec<RawChapter> {
        let chapters = if self.patterns.chapter.is_empty() {
            Vec::new()
        } else {
            self.detect_chapters(pages)
        };
        if !chapters.is_empty() {
            return chapters;
        }

        log::info!(
            "No chapters detected, grouping every {} pages",
            FALLBACK_PAGES_PER_CHAPTER
        );
        paginate(pages)
    }

    fn detect_chapters(&self, pages: &[String]) -> Vec<RawChapter> {
        let mut chapters = Vec::new();
        let mut buffer = PageBuffer::default();

        for (i, raw) in pages.iter().enumerate() {
            let page_number = i + 1;
            let Some(page) = clean_page(raw) else {
                log::debug!("Skipping near-empty page {}", page_number);
                continue;
            };

            let heading = self
                .patterns
                .chapter_heading(
                    page.lines()
                        .filter(|l| !l.trim().is_empty())
                        .take(HEADING_SCAN_LINES),
                )
                .map(str::to_string);

            if let Some(heading) = &heading {
                let title = buffer.title.take();
                buffer.flush(title, &mut chapters);
                buffer.title = Some(heading.clone());
            }

            buffer.push(page_number, self.add_pauses(&page));

            if heading.is_none() && buffer.pages.len() >= FORCED_FLUSH_PAGES {
                let title = buffer.range_title();
                buffer.flush(Some(title), &mut chapters);
            }
        }

        let title = buffer.title.take();
        buffer.flush(title, &mut chapters);
        chapters
    }

    /// Mark pauses at blank lines, section titles, list items, special
    /// section openers, and paragraph ends.
    pub fn add_pauses(&self, page: &str) -> String {
        let lines: Vec<&str> = page.split('\n').map(str::trim).collect();
        let mut out: Vec<&str> = Vec::with_capacity(lines.len() * 2);

        for (i, line) in lines.iter().copied().enumerate() {
            if line.is_empty() {
                out.push(PAUSE_MARKER);
            } else if self.patterns.is_section_title(line) {
                out.extend([PAUSE_MARKER, line, PAUSE_MARKER]);
            } else if self.patterns.is_bullet(line) {
                out.extend([PAUSE_MARKER, line]);
            } else if self.ends_paragraph(line, lines.get(i + 1).copied()) {
                out.extend([line, PAUSE_MARKER]);
            } else if self.patterns.is_section_opener(line) {
                out.extend([PAUSE_MARKER, line]);
            } else {
                out.push(line);
            }
        }

        out.join("\n")
    }

    fn ends_paragraph(&self, line: &str, next: Option<&str>) -> bool {
        if !line.ends_with(['.', ':', ';']) {
            return false;
        }
        match next {
            Some(next) => next.is_empty() || starts_uppercase(next) || self.patterns.is_section_title(next),
            None => false,
        }
    }
}

impl DocumentExtractor for PdfExtractor {
    fn format(&self) -> &'static str {
        "PDF"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedBook> {
        let pages = extract_pages(bytes)?;
        log::info!("PDF has {} pages", pages.len());

        Ok(ExtractedBook {
            title: None,
            author: None,
            chapters: self.chapters_from_pages(&pages),
        })
    }
}

fn container_error(message: impl Into<String>) -> NarratorError {
    NarratorError::Container {
        format: "PDF",
        message: message.into(),
    }
}

/// Text of every page, in page order.
///
/// The parser panics on some malformed files; a panic while opening the
/// document becomes an error, and a page that fails or panics is logged and
/// left empty so the remaining pages still come through.
fn extract_pages(bytes: &[u8]) -> Result<Vec<String>> {
    let mut doc = panic::catch_unwind(|| Document::load_mem(bytes))
        .map_err(|_| container_error("parser panicked while opening the document"))?
        .map_err(|e| container_error(e.to_string()))?;

    if doc.is_encrypted() {
        doc.decrypt("").map_err(|e| container_error(e.to_string()))?;
    }

    let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
    Ok(read_pages(&numbers, |number| page_text(&doc, number)))
}

fn page_text(doc: &Document, number: u32) -> std::result::Result<String, String> {
    let mut text = String::new();
    {
        let mut output = PlainTextOutput::new(&mut text);
        pdf_extract::output_doc_page(doc, &mut output, number).map_err(|e| e.to_string())?;
    }
    Ok(text)
}

/// Run `read` for each page number, substituting an empty page for any
/// that fails or panics.
fn read_pages<F>(numbers: &[u32], mut read: F) -> Vec<String>
where
    F: FnMut(u32) -> std::result::Result<String, String>,
{
    numbers
        .iter()
        .map(|&number| match panic::catch_unwind(AssertUnwindSafe(|| read(number))) {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                log::warn!("Skipping PDF page {}: {}", number, e);
                String::new()
            }
            Err(_) => {
                log::warn!("Skipping PDF page {}: parser panicked", number);
                String::new()
            }
        })
        .collect()
}

/// Page text with spacing normalized, or `None` when too short to matter.
fn clean_page(raw: &str) -> Option<String> {
    let text = clean_text(raw);
    if text.trim().chars().count() < MIN_PAGE_CHARS {
        return None;
    }
    let text = SPACE_RUN.replace_all(&text, " ");
    Some(BLANK_LINES.replace_all(&text, "\n\n").into_owned())
}

fn join_pages(pages: &[String]) -> String {
    let joined = collapse_pauses(&pages.join("\n\n"));
    NEWLINE_RUN.replace_all(&joined, "\n").trim().to_string()
}

/// Fixed-size page groups, without pause processing.
fn paginate(pages: &[String]) -> Vec<RawChapter> {
    let mut chapters = Vec::new();
    let mut buffer = PageBuffer::default();

    for (i, raw) in pages.iter().enumerate() {
        let Some(page) = clean_page(raw) else {
            continue;
        };
        buffer.push(i + 1, page);

        if buffer.pages.len() >= FALLBACK_PAGES_PER_CHAPTER {
            let title = buffer.range_title();
            buffer.flush(Some(title), &mut chapters);
        }
    }

    let title = buffer.range_title();
    buffer.flush(Some(title), &mut chapters);
    chapters
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> PdfExtractor {
        PdfExtractor::new(ExtractionPatterns::builtin().unwrap())
    }

    /// A page of body text that is long enough to keep and never reads as a
    /// title or heading.
    fn body(tag: usize) -> String {
        format!(
            "running text for page {} continues across several lines\nand keeps going without any heading in sight",
            tag
        )
    }

    #[test]
    fn test_clean_page() {
        let raw = format!("a    b\t\tc\n\n\n\n{}", "d".repeat(60));
        assert_eq!(clean_page(&raw), Some(format!("a b c\n\n{}", "d".repeat(60))));
        assert_eq!(clean_page("  12  "), None);
    }

    #[test]
    fn test_failing_pages_are_skipped() {
        let pages = read_pages(&[1, 2, 3, 4], |number| match number {
            2 => Err("bad content stream".to_string()),
            3 => panic!("MediaBox"),
            n => Ok(body(n as usize)),
        });
        assert_eq!(pages, vec![body(1), String::new(), String::new(), body(4)]);

        let chapters = extractor().chapters_from_pages(&pages);
        let text: String = chapters.iter().map(|c| c.text.as_str()).collect();
        assert!(text.contains("page 1") && text.contains("page 4"));
    }

    #[test]
    fn test_garbage_is_a_container_error() {
        let err = extractor().extract(b"%PDF-1.4 not really").unwrap_err();
        assert!(matches!(err, NarratorError::Container { format: "PDF", .. }));
    }

    #[test]
    fn test_add_pauses() {
        let page = "INTRODUCTION\n\
                    The first line of this paragraph ends here.\n\
                    Next line starts with an uppercase letter and continues\n\
                    \n\
                    • bullet item here\n\
                    plain continuation line";
        let expected = "... ...\nINTRODUCTION\n... ...\n\
                        The first line of this paragraph ends here.\n... ...\n\
                        Next line starts with an uppercase letter and continues\n\
                        ... ...\n\
                        ... ...\n• bullet item here\n\
                        plain continuation line";
        assert_eq!(extractor().add_pauses(page), expected);
    }

    #[test]
    fn test_section_opener_gets_pause() {
        let line = format!("Exemplos: {}", "a long list of example items ".repeat(4));
        let out = extractor().add_pauses(&format!("{}\nmore text follows", line.trim()));
        assert!(out.starts_with("... ...\nExemplos:"));
    }

    #[test]
    fn test_paragraph_end_needs_capital_or_blank_next() {
        let e = extractor();
        let out = e.add_pauses("this line ends with a period but then.\nlowercase text continues on here");
        assert!(!out.contains(PAUSE_MARKER));
    }

    #[test]
    fn test_detects_chapters_at_headings() {
        let pages = vec![
            format!("Chapter 1\n{}", body(1)),
            body(2),
            format!("Chapter 2\n{}", body(3)),
        ];
        let chapters = extractor().chapters_from_pages(&pages);

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title.as_deref(), Some("Chapter 1"));
        assert!(chapters[0].text.contains("page 1"));
        assert!(chapters[0].text.contains("page 2"));
        assert_eq!(chapters[1].title.as_deref(), Some("Chapter 2"));
        assert!(chapters[1].text.contains("page 3"));
    }

    #[test]
    fn test_heading_must_be_near_page_top() {
        let lines: Vec<String> = (0..6).map(|i| format!("filler line number {}", i)).collect();
        let page = format!("{}\nChapter 9\n{}", lines.join("\n"), body(1));
        let chapters = extractor().chapters_from_pages(&[page]);
        assert_eq!(chapters.len(), 1);
        assert_eq!(chapters[0].title, None);
    }

    #[test]
    fn test_short_pages_are_skipped() {
        let pages = vec![format!("Chapter 1\n{}", body(1)), "  7  ".to_string(), body(3)];
        let chapters = extractor().chapters_from_pages(&pages);
        assert_eq!(chapters.len(), 1);
        assert!(!chapters[0].text.contains(" 7 "));
    }

    #[test]
    fn test_forced_flush_after_ten_pages() {
        let mut pages = vec![format!("Chapter 1\n{}", body(1))];
        pages.extend((2..=12).map(body));
        let chapters = extractor().chapters_from_pages(&pages);

        assert_eq!(chapters.len(), 2);
        assert_eq!(chapters[0].title.as_deref(), Some("Pages 1-10"));
        assert!(chapters[0].text.contains("page 10"));
        assert!(!chapters[0].text.contains("page 11"));
        assert_eq!(chapters[1].title, None);
        assert!(chapters[1].text.contains("page 12"));
    }

    #[test]
    fn test_chapter_length_boundary() {
        // "... ...\nChapter 1\n... ...\n" adds 26 characters around the body.
        let e = extractor();
        let page = |n: usize| format!("Chapter 1\n{}", "a".repeat(n - 26));

        assert!(e.chapters_from_pages(&[page(100)]).is_empty());

        let kept = e.chapters_from_pages(&[page(101)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text.chars().count(), 101);
        assert_eq!(kept[0].title.as_deref(), Some("Chapter 1"));
    }

    #[test]
    fn test_fallback_length_boundary() {
        let e = extractor();
        assert!(paginate(&["a".repeat(100)]).is_empty());
        let kept = paginate(&["a".repeat(101)]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title.as_deref(), Some("Pages 1-1"));
        assert_eq!(e.chapters_from_pages(&["a".repeat(101)]).len(), 1);
    }

    #[test]
    fn test_paginate_groups_twenty_pages() {
        let pages: Vec<String> = (1..=45).map(body).collect();
        let chapters = paginate(&pages);
        let titles: Vec<Option<&str>> = chapters.iter().map(|c| c.title.as_deref()).collect();
        assert_eq!(titles, vec![Some("Pages 1-20"), Some("Pages 21-40"), Some("Pages 41-45")]);
    }

    #[test]
    fn test_pause_runs_are_capped_across_pages() {
        let pages = vec![
            format!("Chapter 1\n{}\nTHE END\n\n", body(1)),
            format!("INTERLUDE\n{}", body(2)),
        ];
        let chapters = extractor().chapters_from_pages(&pages);
        assert_eq!(chapters.len(), 1);
        assert!(chapters[0].text.contains("THE END\n... ... ... ... ... ...\nINTERLUDE"));
    }

    #[test]
    fn test_corrupt_pdf() {
        let err = extractor().extract(b"%PDF-garbage").unwrap_err();
        assert!(matches!(err, NarratorError::Container { format: "PDF", .. }));
    }
}

//! Regex tables that drive structural classification.
//!
//! Tables are plain values handed to an extractor at construction time, so
//! callers and tests can swap in their own sets.

use crate::error::{NarratorError, Result};
use regex::Regex;

/// Lines that open a new chapter.
const CHAPTER_PATTERNS: &[(&str, &str)] = &[
    (r"^(?i:CAPÍTULO|CHAPTER)\s+([IVXLCDM]+|\d+)", "chapter"),
    (r"^(?i:PARTE|PART)\s+([IVXLCDM]+|\d+)", "part"),
    (r"^\d+\.\s+\p{Lu}", "numbered heading"),
    (r"^[IVXLCDM]+\.\s+", "roman heading"),
    (r"^CASA\s+[IVXLCDM]+", "house"),
];

/// Short lines read as subtitles rather than body text.
const SUBTITLE_PATTERNS: &[(&str, &str)] = &[
    (
        r"(?i)^\d+\s*de\s+(janeiro|fevereiro|março|abril|maio|junho|julho|agosto|setembro|outubro|novembro|dezembro)",
        "date",
    ),
    (
        r"(?i)^\d+\s+(of\s+)?(january|february|march|april|may|june|july|august|september|october|november|december)",
        "date",
    ),
    (r"(?i)^(capítulo|chapter)\s+[ivxlcdm\d]+", "chapter label"),
    (r"(?i)^(diário|diary)\s+(de|of)", "diary"),
    (r"^\([^)]*\)", "parenthetical"),
    (r"^\d+\s*$", "number"),
    (r"^[\p{Lu}\s]{3,}$", "all caps"),
    (r"^\w+\s+na\s+Casa\s+[IVXLCDM]+", "placement"),
    (r"^(Síntese|Exemplos|Aporia):", "section opener"),
];

/// PDF lines rendered as section titles.
const SECTION_TITLE_PATTERNS: &[(&str, &str)] = &[
    (r"^CASA [IVX]+$", "house"),
    (r"^[\p{Lu}\s]+$", "all caps"),
    (r"^\w+\s+na\s+Casa\s+[IVX]+$", "placement"),
    (r"^(Síntese|Exemplos|Aporia):", "section opener"),
];

const BULLET_PATTERNS: &[(&str, &str)] = &[
    (r"^•\s+", "bullet"),
    (r"^\*\s+", "asterisk"),
    (r"^-\s+", "hyphen"),
    (r"^\d+\.\s+", "numbered"),
];

/// Openers of special PDF sections, preceded by a pause.
const SECTION_OPENER_PATTERNS: &[(&str, &str)] = &[(r"^(Síntese|Exemplos):", "section opener")];

pub const MAX_SUBTITLE_CHARS: usize = 200;
pub const MAX_SUBTITLE_WORDS: usize = 6;
pub const MAX_SECTION_TITLE_CHARS: usize = 100;
pub const MAX_SECTION_TITLE_WORDS: usize = 5;

/// A compiled pattern and what a match means.
#[derive(Debug, Clone)]
pub struct PatternEntry {
    pub regex: Regex,
    pub meaning: String,
}

/// An ordered, immutable list of patterns. The first match wins.
#[derive(Debug, Clone, Default)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    /// Compile `(pattern, meaning)` pairs in order.
    pub fn new(pairs: &[(&str, &str)]) -> Result<Self> {
        let entries = pairs
            .iter()
            .map(|(pattern, meaning)| compile(pattern, meaning))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// Compile user-supplied patterns, e.g. from the config file.
    pub fn from_patterns(patterns: &[String]) -> Result<Self> {
        let entries = patterns
            .iter()
            .map(|pattern| compile(pattern, "custom"))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { entries })
    }

    /// The first entry matching `text`.
    pub fn find(&self, text: &str) -> Option<&PatternEntry> {
        self.entries.iter().find(|e| e.regex.is_match(text))
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.find(text).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn compile(pattern: &str, meaning: &str) -> Result<PatternEntry> {
    let regex = Regex::new(pattern).map_err(|e| NarratorError::InvalidPattern {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })?;
    Ok(PatternEntry {
        regex,
        meaning: meaning.to_string(),
    })
}

/// Every table the extractors consult.
#[derive(Debug, Clone)]
pub struct ExtractionPatterns {
    pub chapter: PatternTable,
    pub subtitle: PatternTable,
    pub section_title: PatternTable,
    pub bullet: PatternTable,
    pub section_opener: PatternTable,
}

impl ExtractionPatterns {
    /// The built-in tables.
    pub fn builtin() -> Result<Self> {
        Ok(Self {
            chapter: PatternTable::new(CHAPTER_PATTERNS)?,
            subtitle: PatternTable::new(SUBTITLE_PATTERNS)?,
            section_title: PatternTable::new(SECTION_TITLE_PATTERNS)?,
            bullet: PatternTable::new(BULLET_PATTERNS)?,
            section_opener: PatternTable::new(SECTION_OPENER_PATTERNS)?,
        })
    }

    /// The built-in tables with the chapter and subtitle sets replaced where
    /// an override is given.
    pub fn with_overrides(chapter: Option<&[String]>, subtitle: Option<&[String]>) -> Result<Self> {
        let mut patterns = Self::builtin()?;
        if let Some(chapter) = chapter {
            patterns.chapter = PatternTable::from_patterns(chapter)?;
        }
        if let Some(subtitle) = subtitle {
            patterns.subtitle = PatternTable::from_patterns(subtitle)?;
        }
        Ok(patterns)
    }

    /// Whether a block of EPUB text reads as a subtitle.
    ///
    /// Short text that matches a subtitle pattern, or that is a handful of
    /// words without a closing period.
    pub fn is_subtitle(&self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || text.chars().count() > MAX_SUBTITLE_CHARS {
            return false;
        }
        if self.subtitle.is_match(text) {
            return true;
        }
        text.split_whitespace().count() <= MAX_SUBTITLE_WORDS && !text.ends_with('.')
    }

    /// Whether a PDF line reads as a section title.
    pub fn is_section_title(&self, line: &str) -> bool {
        let line = line.trim();
        if line.is_empty() || line.chars().count() > MAX_SECTION_TITLE_CHARS {
            return false;
        }
        if self.section_title.is_match(line) {
            return true;
        }
        line.split_whitespace().count() <= MAX_SECTION_TITLE_WORDS && starts_uppercase(line)
    }

    pub fn is_bullet(&self, line: &str) -> bool {
        self.bullet.is_match(line.trim())
    }

    pub fn is_section_opener(&self, line: &str) -> bool {
        self.section_opener.is_match(line.trim())
    }

    /// The first of `lines` that opens a chapter.
    pub fn chapter_heading<'a>(&self, lines: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
        lines
            .into_iter()
            .map(str::trim)
            .find(|line| self.chapter.is_match(line))
    }
}

pub fn starts_uppercase(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_uppercase)
}

//! Text processing for TTS: fragment normalization and pause-aware chunking.

pub mod chunker;
pub mod normalizer;

pub use chunker::{chunk_text, process_chapter};

/// Token inserted wherever a reading should breathe.
pub const PAUSE_MARKER: &str = "... ...";

/// Runs of pause markers longer than this collapse down to this many.
pub const MAX_CONSECUTIVE_PAUSES: usize = 3;

/// Whether text has anything for a voice to say, as opposed to pause
/// punctuation alone.
pub fn is_speakable(text: &str) -> bool {
    text.chars().any(char::is_alphanumeric)
}

/// Classification of an extracted span of document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Header,
    Subtitle,
    Text,
    Pause,
}

/// A classified span of extracted text, prior to normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub kind: FragmentKind,
    /// Empty for pauses
    pub content: String,
    /// Structural nesting depth; only informs classification
    pub depth: usize,
}

impl Fragment {
    pub fn header(content: impl Into<String>, depth: usize) -> Self {
        Self {
            kind: FragmentKind::Header,
            content: content.into(),
            depth,
        }
    }

    pub fn subtitle(content: impl Into<String>, depth: usize) -> Self {
        Self {
            kind: FragmentKind::Subtitle,
            content: content.into(),
            depth,
        }
    }

    pub fn text(content: impl Into<String>, depth: usize) -> Self {
        Self {
            kind: FragmentKind::Text,
            content: content.into(),
            depth,
        }
    }

    pub fn pause(depth: usize) -> Self {
        Self {
            kind: FragmentKind::Pause,
            content: String::new(),
            depth,
        }
    }

    pub fn is_pause(&self) -> bool {
        self.kind == FragmentKind::Pause
    }
}

/// A chunk of text ready for TTS processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// 1-based index of the chapter this chunk belongs to
    pub chapter_index: usize,
    /// 0-based playback position within the chapter
    pub sequence_index: usize,
    /// The text content
    pub text: String,
}

impl TextChunk {
    /// Create a new text chunk.
    pub fn new(chapter_index: usize, sequence_index: usize, text: String) -> Self {
        Self {
            chapter_index,
            sequence_index,
            text,
        }
    }

    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_speakable(&self) -> bool {
        is_speakable(&self.text)
    }
}

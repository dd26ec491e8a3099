//! Pause-aware text chunking for TTS processing.
//!
//! Text is split at the coarsest boundary that produces pieces within the
//! budget: pause markers, then paragraph breaks, sentence ends, clause
//! punctuation, whitespace, and finally fixed-width character windows.
//! Pieces at each level are greedily packed back together while they fit,
//! so chunks stay as large as the engine allows.

use super::{PAUSE_MARKER, TextChunk, is_speakable};
use once_cell::sync::Lazy;
use regex::Regex;
use tts_client::ChunkBudget;

static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t]*\n").expect("valid regex"));

/// Closing characters that stay attached to the sentence they end.
const CLOSERS: &[char] = &['"', '\'', ')', ']', '\u{201d}', '\u{2019}', '\u{bb}'];

/// Splitting granularity, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Pause,
    Paragraph,
    Sentence,
    Clause,
    Word,
    Character,
}

impl Level {
    fn finer(self) -> Level {
        match self {
            Level::Pause => Level::Paragraph,
            Level::Paragraph => Level::Sentence,
            Level::Sentence => Level::Clause,
            Level::Clause => Level::Word,
            Level::Word | Level::Character => Level::Character,
        }
    }

    /// Separator placed between pieces packed into the same chunk.
    fn joiner(self) -> &'static str {
        match self {
            Level::Paragraph => "\n\n",
            _ => " ",
        }
    }

    /// Split into trimmed, non-empty pieces. Boundaries only fall on
    /// whitespace, so no non-whitespace character is lost or reordered.
    fn split(self, text: &str) -> Vec<&str> {
        let pieces: Vec<&str> = match self {
            Level::Pause => text.split_inclusive(PAUSE_MARKER).collect(),
            Level::Paragraph => PARAGRAPH_BREAK.split(text).collect(),
            Level::Sentence => split_after(text, |c| matches!(c, '.' | '!' | '?'), true),
            Level::Clause => split_after(text, |c| matches!(c, ',' | ';' | ':'), false),
            Level::Word => text.split_whitespace().collect(),
            Level::Character => vec![text],
        };

        pieces
            .into_iter()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// Split text into TTS-sized chunks.
///
/// Returns an empty list for blank input and the trimmed text itself when it
/// already fits. Every chunk is non-empty and at most `budget.max_chars`
/// characters; chunks are in original text order.
pub fn chunk_text(text: &str, budget: ChunkBudget) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let max_chars = budget.max_chars.max(1);
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let start = if budget.sentence_first {
        Level::Sentence
    } else {
        Level::Pause
    };

    let mut chunks = Vec::new();
    split_level(text, max_chars, start, String::new(), &mut chunks);
    chunks
}

/// Greedily pack the pieces of `text` at `level`, descending a level for
/// any piece that alone exceeds the budget.
///
/// `carry` is pause punctuation left over from the coarser level; it opens
/// the first chunk instead of being sent on its own.
fn split_level(text: &str, max_chars: usize, level: Level, carry: String, chunks: &mut Vec<String>) {
    if level == Level::Character {
        if carry.is_empty() {
            hard_split(text, max_chars, chunks);
        } else {
            hard_split(&format!("{} {}", carry, text), max_chars, chunks);
        }
        return;
    }

    let joiner = level.joiner();
    let joiner_len = char_len(joiner);
    let mut current_len = char_len(&carry);
    let mut current = carry;

    for piece in level.split(text) {
        let piece_len = char_len(piece);

        if piece_len > max_chars {
            let carry = if is_speakable(&current) {
                flush(&mut current, &mut current_len, chunks);
                String::new()
            } else {
                current_len = 0;
                std::mem::take(&mut current)
            };
            split_level(piece, max_chars, level.finer(), carry, chunks);
        } else if current.is_empty() {
            current.push_str(piece);
            current_len = piece_len;
        } else if current_len + joiner_len + piece_len <= max_chars {
            current.push_str(joiner);
            current.push_str(piece);
            current_len += joiner_len + piece_len;
        } else {
            flush(&mut current, &mut current_len, chunks);
            current.push_str(piece);
            current_len = piece_len;
        }
    }

    flush(&mut current, &mut current_len, chunks);
}

fn flush(current: &mut String, current_len: &mut usize, chunks: &mut Vec<String>) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
    *current_len = 0;
}

/// Cut an unbreakable run into near-equal windows of at most `max_chars`.
fn hard_split(text: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let chars: Vec<char> = text.chars().collect();
    let parts = chars.len().div_ceil(max_chars);
    let width = chars.len().div_ceil(parts.max(1));

    log::warn!(
        "No natural break in {} characters; splitting into {} pieces of up to {} characters",
        chars.len(),
        parts,
        width
    );

    for window in chars.chunks(width.max(1)) {
        chunks.push(window.iter().collect());
    }
}

/// Split after runs of delimiter characters that are followed by whitespace
/// or the end of the text.
///
/// With `with_closers`, quotes and brackets directly after the delimiter run
/// stay with the preceding piece.
fn split_after(text: &str, is_delimiter: fn(char) -> bool, with_closers: bool) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut iter = text.char_indices().peekable();

    while let Some((_, c)) = iter.next() {
        if !is_delimiter(c) {
            continue;
        }

        while let Some(&(_, next)) = iter.peek() {
            if is_delimiter(next) || (with_closers && CLOSERS.contains(&next)) {
                iter.next();
            } else {
                break;
            }
        }

        match iter.peek() {
            Some(&(idx, next)) if next.is_whitespace() => {
                pieces.push(&text[start..idx]);
                start = idx;
            }
            None => {
                pieces.push(&text[start..]);
                start = text.len();
            }
            _ => {}
        }
    }

    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Process a chapter's text into TTS-ready chunks.
///
/// # Arguments
/// * `chapter_index` - The chapter's 1-based index
/// * `text` - The chapter text, pause markers included
/// * `budget` - The active engine's chunk budget
pub fn process_chapter(chapter_index: usize, text: &str, budget: ChunkBudget) -> Vec<TextChunk> {
    chunk_text(text, budget)
        .into_iter()
        .enumerate()
        .map(|(sequence_index, text)| TextChunk::new(chapter_index, sequence_index, text))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn budget(max_chars: usize) -> ChunkBudget {
        ChunkBudget::new(max_chars)
    }

    fn non_whitespace(text: &str) -> String {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_chunk_short_text() {
        let chunks = chunk_text("  Olá mundo. Tudo bem?  ", budget(280));
        assert_eq!(chunks, vec!["Olá mundo. Tudo bem?"]);
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("", budget(280)).is_empty());
        assert!(chunk_text("   \n\n   ", budget(280)).is_empty());
    }

    #[test]
    fn test_splits_on_pause_markers_first() {
        let text = "First section here. ... ... Second section here. ... ... Third section here.";
        let chunks = chunk_text(text, budget(40));
        assert_eq!(
            chunks,
            vec![
                "First section here. ... ...",
                "Second section here. ... ...",
                "Third section here.",
            ]
        );
    }

    #[test]
    fn test_packs_sections_greedily() {
        let text = "One. ... ... Two. ... ... Three. ... ... Four.";
        let chunks = chunk_text(text, budget(25));
        assert_eq!(chunks, vec!["One. ... ... Two. ... ...", "Three. ... ... Four."]);
    }

    #[test]
    fn test_oversized_section_falls_back_to_paragraphs() {
        let text = "Paragraph one is here.\n\nParagraph two is here.\n\nParagraph three.";
        let chunks = chunk_text(text, budget(50));
        assert_eq!(
            chunks,
            vec!["Paragraph one is here.\n\nParagraph two is here.", "Paragraph three."]
        );
    }

    #[test]
    fn test_oversized_paragraph_falls_back_to_sentences() {
        let text = "First sentence here. Second one! Third, maybe? Fourth sentence.";
        let chunks = chunk_text(text, budget(35));
        assert_eq!(
            chunks,
            vec!["First sentence here. Second one!", "Third, maybe? Fourth sentence."]
        );
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 35);
        }
    }

    #[test]
    fn test_sentence_keeps_closing_quote() {
        let pieces = split_after("\"Stop!\" she said. Then left.", |c| matches!(c, '.' | '!' | '?'), true);
        assert_eq!(pieces, vec!["\"Stop!\"", " she said.", " Then left."]);
    }

    #[test]
    fn test_decimal_point_is_not_a_sentence_end() {
        let pieces = split_after("It costs 3.50 today. Really.", |c| matches!(c, '.' | '!' | '?'), true);
        assert_eq!(pieces, vec!["It costs 3.50 today.", " Really."]);
    }

    #[test]
    fn test_long_sentence_splits_on_commas() {
        let text = "This sentence has many parts, each one separated by commas, which are natural breaks, and it goes on";
        let chunks = chunk_text(text, budget(40));
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 40, "Chunk too long: {}", chunk);
        }
        assert_eq!(chunks[0], "This sentence has many parts,");
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(text));
    }

    #[test]
    fn test_sentence_first_skips_pause_grouping() {
        let text = "Short one. Another short. ... ... After pause. Last bit here.";
        let chunks = chunk_text(text, budget(30).sentence_first());
        assert_eq!(chunks[0], "Short one. Another short. ...");
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 30);
        }
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(text));
    }

    #[test]
    fn test_small_budget_engine_uses_commas() {
        let text = "Um dois três quatro, cinco seis sete oito, nove dez onze doze.";
        let chunks = chunk_text(text, budget(25).sentence_first());
        assert_eq!(
            chunks,
            vec!["Um dois três quatro,", "cinco seis sete oito,", "nove dez onze doze."]
        );
    }

    #[test]
    fn test_unbreakable_run_is_split_not_dropped() {
        let text = format!("Intro. {}. Outro.", "A".repeat(2000));
        let chunks = chunk_text(&text, budget(500));

        assert!(chunks.len() >= 4, "got {} chunks", chunks.len());
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 500);
        }
        assert_eq!(chunks.first().map(String::as_str), Some("Intro."));
        assert_eq!(chunks.last().map(String::as_str), Some("Outro."));
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(&text));
    }

    #[test]
    fn test_leading_pause_joins_oversized_section() {
        let text = format!("... ... {}", "abcd efgh. ".repeat(1000));
        let chunks = chunk_text(&text, budget(8000));

        assert!(chunks.len() >= 2);
        assert!(chunks[0].starts_with("... ... abcd"));
        for chunk in &chunks {
            assert!(is_speakable(chunk), "chunk without speech: {:?}", chunk);
            assert!(chunk.chars().count() <= 8000);
        }
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(&text));
    }

    #[test]
    fn test_hard_split_is_even() {
        let mut chunks = Vec::new();
        hard_split(&"x".repeat(1001), 500, &mut chunks);
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![334, 334, 333]);
    }

    #[test]
    fn test_multibyte_text_counts_characters() {
        let text = "ação ".repeat(50);
        let chunks = chunk_text(&text, budget(20));
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 20);
        }
        assert_eq!(non_whitespace(&chunks.concat()), non_whitespace(&text));
    }

    #[test]
    fn test_budget_of_one() {
        let chunks = chunk_text("ab cd", budget(1));
        assert_eq!(chunks, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn test_process_chapter() {
        let chunks = process_chapter(1, "Olá mundo. Isto é um teste.", budget(280));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chapter_index, 1);
        assert_eq!(chunks[0].sequence_index, 0);
        assert_eq!(chunks[0].text, "Olá mundo. Isto é um teste.");
    }

    #[test]
    fn test_process_chapter_multiple_chunks() {
        let text = "First sentence. Second sentence. Third sentence. Fourth sentence. Fifth sentence.";
        let chunks = process_chapter(5, text, budget(30));
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chapter_index == 5));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence_index, i);
        }
    }

    fn word() -> impl Strategy<Value = String> {
        prop_oneof![
            4 => "[a-zA-Zçãé]{1,12}",
            1 => "[a-z]{1,8}[.!?,;:]",
            1 => Just(PAUSE_MARKER.to_string()),
        ]
    }

    fn spaced_text() -> impl Strategy<Value = String> {
        prop::collection::vec(word(), 0..120).prop_map(|words| words.join(" "))
    }

    fn messy_text() -> impl Strategy<Value = String> {
        prop::collection::vec((word(), prop_oneof![Just(" "), Just("\n\n"), Just("  "), Just("\n")]), 0..120)
            .prop_map(|parts| parts.into_iter().map(|(w, sep)| w + sep).collect())
    }

    proptest! {
        #[test]
        fn prop_no_content_lost(text in messy_text(), max in 1usize..300, sentence_first in any::<bool>()) {
            let mut b = budget(max);
            b.sentence_first = sentence_first;
            let chunks = chunk_text(&text, b);
            prop_assert_eq!(non_whitespace(&chunks.join(" ")), non_whitespace(&text));
        }

        #[test]
        fn prop_chunks_within_budget(text in messy_text(), max in 1usize..300) {
            for chunk in chunk_text(&text, budget(max)) {
                prop_assert!(!chunk.trim().is_empty());
                prop_assert!(chunk.chars().count() <= max);
            }
        }

        #[test]
        fn prop_rechunking_is_stable(text in spaced_text(), max in 20usize..300) {
            let chunks = chunk_text(&text, budget(max));
            prop_assert_eq!(chunk_text(&chunks.join(" "), budget(max)), chunks);
        }
    }
}

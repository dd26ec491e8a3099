//! Text normalization: TTS-safe character cleanup, fragment joining, pause
//! collapsing, and filename sanitization.

use super::{Fragment, FragmentKind, MAX_CONSECUTIVE_PAUSES, PAUSE_MARKER};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Characters that can cause TTS issues and their replacements.
const PROBLEMATIC_CHARS: &[(char, &str)] = &[
    ('\u{2018}', "'"),   // Left single quote
    ('\u{2019}', "'"),   // Right single quote
    ('\u{201c}', "\""),  // Left double quote
    ('\u{201d}', "\""),  // Right double quote
    ('\u{2013}', "-"),   // En dash
    ('\u{2014}', "-"),   // Em dash
    ('\u{2026}', "..."), // Ellipsis
    ('\u{00a0}', " "),   // Non-breaking space
    ('\u{200b}', ""),    // Zero-width space
    ('\u{200c}', ""),    // Zero-width non-joiner
    ('\u{200d}', ""),    // Zero-width joiner
    ('\u{feff}', ""),    // BOM
    ('\u{2011}', "-"),   // Non-breaking hyphen
    ('\u{2012}', "-"),   // Figure dash
    ('\u{2015}', "-"),   // Horizontal bar
    ('\u{00ab}', "\""),  // Left-pointing double angle quote
    ('\u{00bb}', "\""),  // Right-pointing double angle quote
];

/// Characters that may not appear in file names.
const FORBIDDEN_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|', '\n', '\r', '\t'];

/// Name used when sanitizing leaves nothing behind.
const UNTITLED: &str = "Untitled";

static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

static PAUSE_RUN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\.\.\. \.\.\.(?:\s*\.\.\. \.\.\.)+").expect("valid regex")
});

/// Clean text for TTS processing.
///
/// Replaces typographic characters with ASCII equivalents and drops control
/// characters other than newlines and tabs. Whitespace is left untouched.
pub fn clean_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for c in text.chars() {
        let replacement = PROBLEMATIC_CHARS
            .iter()
            .find(|(ch, _)| *ch == c)
            .map(|(_, r)| *r);

        if let Some(r) = replacement {
            result.push_str(r);
        } else if is_allowed_char(c) {
            result.push(c);
        }
    }

    result
}

/// Check if a character is allowed in TTS text.
fn is_allowed_char(c: char) -> bool {
    if c == '\n' || c == '\t' {
        return true;
    }
    !c.is_control()
}

/// Collapse every whitespace run to a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RUN.replace_all(text, " ").trim().to_string()
}

/// Cap runs of consecutive pause markers at [`MAX_CONSECUTIVE_PAUSES`].
pub fn collapse_pauses(text: &str) -> String {
    PAUSE_RUN
        .replace_all(text, |caps: &Captures| {
            let run = &caps[0];
            if run.matches(PAUSE_MARKER).count() > MAX_CONSECUTIVE_PAUSES {
                vec![PAUSE_MARKER; MAX_CONSECUTIVE_PAUSES].join(" ")
            } else {
                run.to_string()
            }
        })
        .into_owned()
}

/// Render a fragment list as chapter text.
///
/// Contents are cleaned and joined with single spaces; each run of pause
/// fragments becomes one marker, longer marker runs are capped, and all
/// whitespace collapses to single spaces.
pub fn join_fragments(fragments: &[Fragment]) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(fragments.len());
    let mut last_kind: Option<FragmentKind> = None;

    for fragment in fragments {
        match fragment.kind {
            FragmentKind::Pause => {
                if last_kind != Some(FragmentKind::Pause) {
                    parts.push(PAUSE_MARKER.to_string());
                }
            }
            FragmentKind::Header | FragmentKind::Subtitle | FragmentKind::Text => {
                parts.push(clean_text(&fragment.content));
            }
        }
        last_kind = Some(fragment.kind);
    }

    collapse_whitespace(&collapse_pauses(&parts.join(" ")))
}

/// Make a string safe to use as a file or directory name.
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let collapsed = collapse_whitespace(name);
    let replaced: String = collapsed
        .chars()
        .map(|c| if FORBIDDEN_FILENAME_CHARS.contains(&c) { '-' } else { c })
        .collect();

    let name = if replaced.is_empty() {
        UNTITLED.to_string()
    } else {
        replaced
    };

    let truncated: String = name.chars().take(max_len).collect();
    let trimmed = truncated.trim_end_matches([' ', '.']);
    if trimmed.is_empty() {
        UNTITLED.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Zero-pad `i` to the width of `total`, never narrower than two digits.
pub fn zero_pad(i: usize, total: usize) -> String {
    let width = total.to_string().len().max(2);
    format!("{:0width$}", i, width = width)
}

/// File name for a chapter artifact, e.g. `"03 - The Storm.mp3"`.
///
/// Names start with the zero-padded index so that lexical order matches
/// reading order.
pub fn chapter_file_name(index: usize, total: usize, title: &str, extension: &str, max_len: usize) -> String {
    format!(
        "{} - {}.{}",
        zero_pad(index, total),
        sanitize_filename(title, max_len),
        extension
    )
}

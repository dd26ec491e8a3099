//! EPUB extraction: walks each content document's markup tree and classifies
//! spans into headers, subtitles, body text, and pauses.

use super::patterns::ExtractionPatterns;
use super::{DocumentExtractor, ExtractedBook, RawChapter};
use crate::error::{NarratorError, Result};
use crate::text::normalizer::{collapse_whitespace, join_fragments};
use crate::text::Fragment;
use epub::doc::EpubDoc;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Node, Selector};
use std::cmp::Ordering;
use std::io::{Cursor, Read, Seek};

/// Chapters with this many characters or fewer are boilerplate.
pub const MIN_CHAPTER_CHARS: usize = 50;

const HEADINGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6"];
const BLOCKS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "p", "div"];
const SKIPPED: &[&str] = &["script", "style"];

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").expect("valid selector"));
static TITLE_HEADINGS: Lazy<[Selector; 3]> = Lazy::new(|| {
    ["h1", "h2", "h3"].map(|tag| Selector::parse(tag).expect("valid selector"))
});

pub struct EpubExtractor {
    patterns: ExtractionPatterns,
}

impl EpubExtractor {
    pub fn new(patterns: ExtractionPatterns) -> Self {
        Self { patterns }
    }

    /// Chapters from the reading order, or from every loose content
    /// document when the reading order yields none.
    pub fn chapters_from_spine_or_loose(
        &self,
        spine: &[String],
        loose: impl FnOnce() -> Vec<String>,
    ) -> Vec<RawChapter> {
        let chapters = self.chapters_from_documents(spine);
        if !chapters.is_empty() {
            return chapters;
        }

        log::warn!("No chapters found in reading order, trying all content documents");
        self.chapters_from_documents(&loose())
    }

    /// One chapter per document whose joined text is long enough.
    pub fn chapters_from_documents(&self, documents: &[String]) -> Vec<RawChapter> {
        documents
            .iter()
            .enumerate()
            .filter_map(|(i, html)| {
                let (title, fragments) = self.parse_document(html);
                let text = join_fragments(&fragments);
                let len = text.chars().count();
                if len <= MIN_CHAPTER_CHARS {
                    log::debug!("Dropping document {} ({} characters)", i + 1, len);
                    return None;
                }
                Some(RawChapter::new(title, text))
            })
            .collect()
    }

    /// Title and classified fragments of one content document.
    pub fn parse_document(&self, html: &str) -> (Option<String>, Vec<Fragment>) {
        let document = Html::parse_document(html);
        let title = document_title(&document);
        let root = document
            .select(&BODY)
            .next()
            .unwrap_or_else(|| document.root_element());

        let mut fragments = Vec::new();
        self.walk(root, 0, &mut fragments);

        if fragments.is_empty() {
            let body = element_text(root);
            if !body.is_empty() {
                fragments.push(Fragment::text(body, 0));
            }
        }

        (title, fragments)
    }

    fn walk(&self, element: ElementRef, depth: usize, out: &mut Vec<Fragment>) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.push_classified(text, depth, out),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.visit(child, depth, out);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit(&self, element: ElementRef, depth: usize, out: &mut Vec<Fragment>) {
        let name = element.value().name();

        if SKIPPED.contains(&name) {
            return;
        }

        if HEADINGS.contains(&name) {
            let text = element_text(element);
            if !text.is_empty() {
                out.push(Fragment::header(text, depth));
                out.push(Fragment::pause(depth));
            }
            return;
        }

        match name {
            "p" | "div" if has_block_descendants(element) => {
                for child in element.children() {
                    match child.value() {
                        Node::Text(text) => {
                            let text = collapse_whitespace(text);
                            if !text.is_empty() {
                                out.push(Fragment::text(text, depth));
                            }
                        }
                        Node::Element(_) => {
                            if let Some(child) = ElementRef::wrap(child) {
                                self.visit(child, depth + 1, out);
                            }
                        }
                        _ => {}
                    }
                }
            }
            "p" | "div" => self.push_classified(&element_text(element), depth, out),
            "br" => out.push(Fragment::pause(depth)),
            _ => self.walk(element, depth, out),
        }
    }

    /// Push text as a subtitle wrapped in pauses, or as body text.
    fn push_classified(&self, text: &str, depth: usize, out: &mut Vec<Fragment>) {
        let text = collapse_whitespace(text);
        if text.is_empty() {
            return;
        }

        if self.patterns.is_subtitle(&text) {
            out.push(Fragment::pause(depth));
            out.push(Fragment::subtitle(text, depth));
            out.push(Fragment::pause(depth));
        } else {
            out.push(Fragment::text(text, depth));
        }
    }

    fn read_book<R: Read + Seek>(&self, mut doc: EpubDoc<R>) -> ExtractedBook {
        let title = doc
            .mdata("title")
            .map(|m| m.value.trim().to_string())
            .filter(|t| !t.is_empty());
        let author = doc
            .mdata("creator")
            .map(|m| m.value.trim().to_string())
            .filter(|a| !a.is_empty());

        let spine_ids: Vec<String> = doc.spine.iter().map(|item| item.idref.clone()).collect();
        let spine: Vec<String> = spine_ids
            .iter()
            .filter_map(|id| read_content_document(&mut doc, id))
            .collect();

        let chapters = self.chapters_from_spine_or_loose(&spine, || {
            let mut ids: Vec<String> = doc.resources.keys().cloned().collect();
            ids.sort_by(|a, b| natural_cmp(a, b));
            ids.iter()
                .filter_map(|id| read_content_document(&mut doc, id))
                .collect()
        });

        ExtractedBook {
            title,
            author,
            chapters,
        }
    }
}

impl DocumentExtractor for EpubExtractor {
    fn format(&self) -> &'static str {
        "EPUB"
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractedBook> {
        let doc = EpubDoc::from_reader(Cursor::new(bytes.to_vec())).map_err(|e| {
            NarratorError::Container {
                format: self.format(),
                message: e.to_string(),
            }
        })?;

        Ok(self.read_book(doc))
    }
}

/// The markup of an (X)HTML resource, or `None` for anything else.
fn read_content_document<R: Read + Seek>(doc: &mut EpubDoc<R>, id: &str) -> Option<String> {
    match doc.get_resource(id) {
        Some((bytes, mime)) if mime.contains("html") => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Some(_) => None,
        None => {
            log::debug!("Skipping unreadable resource {}", id);
            None
        }
    }
}

/// `<title>` text, else the first h1, h2, or h3.
fn document_title(document: &Html) -> Option<String> {
    let from_title = document
        .select(&TITLE)
        .next()
        .map(element_text)
        .filter(|t| !t.is_empty());

    from_title.or_else(|| {
        TITLE_HEADINGS.iter().find_map(|selector| {
            document
                .select(selector)
                .next()
                .map(element_text)
                .filter(|t| !t.is_empty())
        })
    })
}

/// Order strings so embedded numbers compare by value: `ch2` before `ch10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (mut x, mut y) = (a, b);
    loop {
        match (x.chars().next(), y.chars().next()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(cx), Some(cy)) if cx.is_ascii_digit() && cy.is_ascii_digit() => {
                let (nx, rest_x) = split_digits(x);
                let (ny, rest_y) = split_digits(y);
                let (tx, ty) = (nx.trim_start_matches('0'), ny.trim_start_matches('0'));
                let ord = tx.len().cmp(&ty.len()).then_with(|| tx.cmp(ty));
                if ord != Ordering::Equal {
                    return ord;
                }
                x = rest_x;
                y = rest_y;
            }
            (Some(cx), Some(cy)) => {
                if cx != cy {
                    return cx.cmp(&cy);
                }
                x = &x[cx.len_utf8()..];
                y = &y[cy.len_utf8()..];
            }
        }
    }
}

fn split_digits(s: &str) -> (&str, &str) {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s.split_at(end)
}

fn has_block_descendants(element: ElementRef) -> bool {
    element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| BLOCKS.contains(&e.value().name()))
}

/// Visible text of an element with whitespace collapsed.
fn element_text(element: ElementRef) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    collapse_whitespace(&raw)
}

fn collect_text(element: ElementRef, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) if SKIPPED.contains(&e.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

//! Reference extraction from Markdown content
//!
//! Finds parenthetical source citations of the form `([label](url))`.
//! Matching is done paragraph by paragraph so a citation can never span a
//! blank line. Nested brackets or parentheses inside the label are not
//! handled; such text is passed through untouched.

use crate::schema::{MalformedReference, Reference};
use regex::Regex;

/// Inline source citation: `([Display Text](URL))`
pub const REFERENCE_PATTERN: &str = r"\(\[([^\]]+)\]\(([^)]+)\)\)";

/// One or more blank (or whitespace-only) lines
const PARAGRAPH_BREAK: &str = r"\r?\n(?:[ \t]*\r?\n)+";

const SNIPPET_CHARS: usize = 40;

/// Extract every reference in document order
pub fn extract_references(content: &str) -> Vec<Reference> {
    let re = Regex::new(REFERENCE_PATTERN).unwrap();
    let lines = LineIndex::new(content);

    let mut refs = Vec::new();
    for (offset, paragraph) in paragraphs(content) {
        for cap in re.captures_iter(paragraph) {
            let whole = cap.get(0).unwrap();
            let start = offset + whole.start();
            refs.push(Reference {
                label: cap[1].to_string(),
                url: cap[2].to_string(),
                span: (start, offset + whole.end()),
                line: lines.line_of(start),
            });
        }
    }

    refs
}

/// Find `([` openers that no complete reference covers
pub fn find_malformed(content: &str, refs: &[Reference]) -> Vec<MalformedReference> {
    let lines = LineIndex::new(content);

    content
        .match_indices("([")
        .map(|(pos, _)| pos)
        .filter(|pos| !refs.iter().any(|r| *pos >= r.span.0 && *pos < r.span.1))
        .map(|pos| {
            let rest = &content[pos..];
            let line_end = rest.find('\n').unwrap_or(rest.len());
            MalformedReference {
                line: lines.line_of(pos),
                snippet: rest[..line_end].chars().take(SNIPPET_CHARS).collect(),
            }
        })
        .collect()
}

/// Bare http(s) URL, ending at whitespace or closing markup
const BARE_URL: &str = r#"https?://[^\s\)>\]"'`]+"#;

/// The last bare URL in the text, if any
pub fn last_url(content: &str) -> Option<String> {
    let re = Regex::new(BARE_URL).unwrap();
    re.find_iter(content)
        .last()
        .map(|mat| trim_url(mat.as_str()).to_string())
}

// Clean trailing punctuation
fn trim_url(url: &str) -> &str {
    url.trim_end_matches(|c| matches!(c, ',' | '.' | ')' | ']' | ';' | ':'))
}

/// Split content into `(byte_offset, paragraph)` pieces
fn paragraphs(content: &str) -> Vec<(usize, &str)> {
    let re = Regex::new(PARAGRAPH_BREAK).unwrap();

    let mut pieces = Vec::new();
    let mut start = 0;
    for brk in re.find_iter(content) {
        pieces.push((start, &content[start..brk.start()]));
        start = brk.end();
    }
    pieces.push((start, &content[start..]));

    pieces
}

/// Byte offset to 1-based line number lookup
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(content: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(content.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        }
    }
}

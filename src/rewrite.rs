//! Document rewriting: numbered inline links plus a consolidated Sources list

use crate::extract::last_url;
use crate::registry::UrlRegistry;
use crate::schema::{Citation, Reference};
use regex::Regex;
use std::borrow::Cow;
use std::fmt::Write;

/// Heading that opens a Sources section: `# Sources` (any level) or `**Sources:**`
const SOURCES_HEADING: &str = r"(?mi)^(?:#{1,6}[ \t]+Sources:?|\*\*Sources:?\*\*)[ \t]*\r?$";

/// Any ATX heading, capturing its `#` run
const ATX_HEADING: &str = r"(?m)^(#{1,6})[ \t]";

const SOURCE_LINE: &str = r#"^<a id="source-(\d+)"></a>\d+\.\s*(.*)$"#;

/// Trailing `<url>` autolink; the URL itself may contain spaces
const AUTOLINK: &str = r"<([^<>]+)>\s*$";

/// An entry read back from a rendered Sources section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub ordinal: usize,
    pub url: String,
}

/// Anchor id for an ordinal
pub fn anchor_id(ordinal: usize) -> String {
    format!("source-{}", ordinal)
}

/// Replace every reference span and append the Sources section
///
/// References whose URL is absent from `registry` are copied verbatim.
/// With no references the content is returned unchanged; with no citations
/// no Sources section is written.
pub fn rewrite_document(
    content: &str,
    refs: &[Reference],
    registry: &UrlRegistry,
    citations: &[Citation],
) -> String {
    if refs.is_empty() {
        return content.to_string();
    }

    let mut out = String::with_capacity(content.len() + citations.len() * 120);
    let mut cursor = 0;
    for r in refs {
        let (start, end) = r.span;
        out.push_str(&content[cursor..start]);
        match registry.ordinal(&r.url) {
            Some(n) => {
                let _ = write!(out, "[{}](#{})", n, anchor_id(n));
            }
            None => out.push_str(&content[start..end]),
        }
        cursor = end;
    }
    out.push_str(&content[cursor..]);

    if citations.is_empty() {
        return out;
    }

    let mut out = out.trim_end().to_string();
    out.push_str(&render_sources(citations));
    out
}

/// Render the `# Sources` block, one line per citation in ordinal order
pub fn render_sources(citations: &[Citation]) -> String {
    let mut sorted: Vec<&Citation> = citations.iter().collect();
    sorted.sort_by_key(|c| c.ordinal);

    let mut section = String::from("\n\n# Sources\n\n");
    for c in sorted {
        let _ = write!(
            section,
            "<a id=\"{}\"></a>{}. {}",
            anchor_id(c.ordinal),
            c.ordinal,
            c.text
        );
        if !url_recoverable(&c.text, &c.url) {
            let _ = write!(section, " <{}>", c.url);
        }
        section.push('\n');
    }
    section
}

/// Drop the last Sources section
///
/// The section runs from its heading to the next heading of the same or a
/// higher level, or to the end of the document. Anything after it is kept.
/// A `**Sources**` line counts as the lowest level.
pub fn strip_sources_section(content: &str) -> Cow<'_, str> {
    let heading_re = Regex::new(SOURCES_HEADING).unwrap();
    let Some(heading) = heading_re.find_iter(content).last() else {
        return Cow::Borrowed(content);
    };
    let level = heading_level(heading.as_str());

    let atx_re = Regex::new(ATX_HEADING).unwrap();
    let resume = atx_re
        .captures_iter(&content[heading.end()..])
        .find(|cap| cap[1].len() <= level)
        .and_then(|cap| cap.get(0))
        .map(|m| heading.end() + m.start());

    match resume {
        Some(next) => Cow::Owned(format!("{}{}", &content[..heading.start()], &content[next..])),
        None => Cow::Borrowed(&content[..heading.start()]),
    }
}

fn heading_level(heading: &str) -> usize {
    match heading.bytes().take_while(|&b| b == b'#').count() {
        0 => 6,
        n => n,
    }
}

/// Read `(ordinal, url)` entries back from the last Sources section
pub fn parse_sources(content: &str) -> Vec<SourceEntry> {
    let heading_re = Regex::new(SOURCES_HEADING).unwrap();
    let line_re = Regex::new(SOURCE_LINE).unwrap();

    let Some(heading) = heading_re.find_iter(content).last() else {
        return Vec::new();
    };

    content[heading.end()..]
        .lines()
        .filter_map(|line| {
            let cap = line_re.captures(line.trim())?;
            let ordinal = cap[1].parse().ok()?;
            let url = entry_url(&cap[2])?;
            Some(SourceEntry { ordinal, url })
        })
        .collect()
}

/// URL a Sources line resolves to: its trailing autolink, else the last bare URL
fn entry_url(body: &str) -> Option<String> {
    let autolink_re = Regex::new(AUTOLINK).unwrap();
    match autolink_re.captures(body) {
        Some(link) => Some(link[1].to_string()),
        None => last_url(body),
    }
}

/// Whether `parse_sources` would read `url` back from the citation text alone
fn url_recoverable(text: &str, url: &str) -> bool {
    entry_url(text.trim_end()).as_deref() == Some(url)
}

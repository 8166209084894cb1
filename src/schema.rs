//! Core records passed between pipeline stages
//!
//! References come out of extraction, citations out of fetching, and the
//! run summary is what gets printed to stdout.

use serde::{Deserialize, Serialize};

/// An inline citation `([label](url))` found in the source document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Display text inside the brackets
    pub label: String,
    /// Target URL, taken verbatim
    pub url: String,
    /// Byte offsets `(start, end)` of the whole match in the source
    pub span: (usize, usize),
    /// 1-based line where the match starts
    pub line: usize,
}

/// An opening `([` that never became a complete reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedReference {
    pub line: usize,
    pub snippet: String,
}

/// Generated bibliographic text for one unique URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    pub ordinal: usize,
    pub url: String,
    pub text: String,
}

/// What to do with a URL whose citation could not be generated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Keep the source entry with a bracketed failure marker
    #[default]
    Placeholder,
    /// Drop the source entry and leave its inline references untouched
    Omit,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Placeholder => write!(f, "placeholder"),
            FailurePolicy::Omit => write!(f, "omit"),
        }
    }
}

/// Compact JSON summary written to stdout after a run
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub references: usize,
    pub unique_urls: usize,
    pub cited: usize,
    pub failed: usize,
    pub malformed: usize,
    pub dry_run: bool,
    /// Unique URLs in ordinal order (dry runs only)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
    pub timestamp: String,
}

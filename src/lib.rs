//! mdcite: Consolidate inline Markdown source citations
//!
//! Pipeline:
//! - extract: find `([label](url))` references
//! - registry: number unique URLs by first appearance
//! - fetch: request one APA citation per URL, sequentially
//! - rewrite: numbered `[n](#source-n)` links plus a Sources section

pub mod config;
pub mod consolidate;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod provider;
pub mod registry;
pub mod rewrite;
pub mod schema;

pub use config::{Provider, ProviderConfig};
pub use consolidate::{consolidate, consolidate_references, Consolidated, PipelineOptions};
pub use error::AppError;
pub use extract::{extract_references, find_malformed};
pub use fetch::{resolve, CitationFetcher, FetchOutcome};
pub use provider::{ApiClient, CitationSource, FetchError};
pub use registry::UrlRegistry;
pub use rewrite::{parse_sources, rewrite_document, SourceEntry};
pub use schema::{Citation, FailurePolicy, MalformedReference, Reference, RunSummary};

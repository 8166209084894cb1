//! consolidate command: Rewrite inline source citations into numbered links
//!
//! scan → dedupe → fetch → rewrite. Progress goes to stderr, a compact JSON
//! summary to stdout.

use crate::config::{resolve_api_key, Provider, ProviderConfig, API_KEY_ENV, DEFAULT_DELAY_MS};
use crate::error::AppError;
use crate::extract::{extract_references, find_malformed};
use crate::fetch::{resolve, CitationFetcher};
use crate::provider::{ApiClient, CitationSource};
use crate::registry::UrlRegistry;
use crate::rewrite::{rewrite_document, strip_sources_section};
use crate::schema::{FailurePolicy, Reference, RunSummary};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use std::borrow::Cow;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Args, Debug)]
pub struct ConsolidateArgs {
    /// Markdown file to read
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Where to write the rewritten Markdown
    #[arg(value_name = "OUTPUT")]
    pub output: PathBuf,

    /// API key (falls back to the provider variable when unset)
    #[arg(short = 'k', long, env = API_KEY_ENV, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Citation provider
    #[arg(long, value_enum, default_value_t = Provider::Gemini)]
    pub provider: Provider,

    /// Model name (defaults to the provider's)
    #[arg(long)]
    pub model: Option<String>,

    /// API base URL (proxies, testing)
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Pause between citation requests in milliseconds
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    pub delay_ms: u64,

    /// What to do when a citation cannot be generated
    #[arg(long, value_enum, default_value_t = FailurePolicy::Placeholder)]
    pub on_failure: FailurePolicy,

    /// Remove an existing trailing Sources section before processing
    #[arg(long)]
    pub replace_sources: bool,

    /// Only extract and deduplicate; no API calls, no output file
    #[arg(long)]
    pub dry_run: bool,
}

/// Pipeline tuning independent of the CLI
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub delay: Duration,
    pub policy: FailurePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(DEFAULT_DELAY_MS),
            policy: FailurePolicy::Placeholder,
        }
    }
}

/// Rewritten document plus counters for the summary
#[derive(Debug)]
pub struct Consolidated {
    pub document: String,
    pub references: usize,
    pub unique_urls: usize,
    pub cited: usize,
    pub failed: usize,
    pub malformed: usize,
}

impl Consolidated {
    /// Result for a document with nothing to cite
    fn unchanged(content: &str, malformed: usize) -> Self {
        Self {
            document: content.to_string(),
            references: 0,
            unique_urls: 0,
            cited: 0,
            failed: 0,
            malformed,
        }
    }
}

/// Run the full pipeline over `content` using `source` for citations
pub async fn consolidate<S>(content: &str, source: &S, options: &PipelineOptions) -> Consolidated
where
    S: CitationSource + ?Sized,
{
    let refs = extract_references(content);
    consolidate_references(content, &refs, source, options).await
}

/// Same as [`consolidate`] for references already extracted from `content`
pub async fn consolidate_references<S>(
    content: &str,
    refs: &[Reference],
    source: &S,
    options: &PipelineOptions,
) -> Consolidated
where
    S: CitationSource + ?Sized,
{
    let malformed = report_malformed(content, refs);

    if refs.is_empty() {
        info!("No source references found");
        return Consolidated::unchanged(content, malformed);
    }

    let registry = UrlRegistry::from_references(refs);
    info!(
        "Found {} source references, {} unique URLs",
        refs.len(),
        registry.len()
    );

    let outcomes = CitationFetcher::new(source, options.delay)
        .fetch_all(&registry)
        .await;
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    let unique_urls = registry.len();

    let (registry, citations) = resolve(&registry, outcomes, options.policy);
    let document = rewrite_document(content, refs, &registry, &citations);

    Consolidated {
        document,
        references: refs.len(),
        unique_urls,
        cited: unique_urls - failed,
        failed,
        malformed,
    }
}

/// Log every malformed reference and return how many there were
fn report_malformed(content: &str, refs: &[Reference]) -> usize {
    let malformed = find_malformed(content, refs);
    for m in &malformed {
        warn!(line = m.line, snippet = %m.snippet, "Skipping malformed source reference");
    }
    malformed.len()
}

/// Run the consolidate command
pub async fn run_consolidate(args: ConsolidateArgs) -> Result<()> {
    if !args.input.is_file() {
        return Err(AppError::FileNotFound(args.input.clone()).into());
    }

    let raw = tokio::fs::read_to_string(&args.input)
        .await
        .with_context(|| format!("Failed to read file: {}", args.input.display()))?;

    info!("Processing {}...", args.input.display());

    let content = if args.replace_sources {
        strip_sources_section(&raw)
    } else {
        Cow::Borrowed(raw.as_str())
    };

    if args.dry_run {
        return dry_run(&args, &content);
    }

    let options = PipelineOptions {
        delay: Duration::from_millis(args.delay_ms),
        policy: args.on_failure,
    };

    let refs = extract_references(&content);
    let result = if refs.is_empty() {
        // No key needed when there is nothing to cite
        info!("No source references found");
        Consolidated::unchanged(&content, report_malformed(&content, &refs))
    } else {
        let api_key = resolve_api_key(args.api_key.as_deref(), args.provider)?;
        let config = ProviderConfig::new(
            args.provider,
            api_key,
            args.model.clone(),
            args.base_url.clone(),
        );
        info!(provider = %config.provider, model = %config.model, "Generating citations");
        let client = ApiClient::new(config).context("Failed to build HTTP client")?;
        consolidate_references(&content, &refs, &client, &options).await
    };

    tokio::fs::write(&args.output, &result.document)
        .await
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    info!("Saved {}", args.output.display());

    let summary = RunSummary {
        input: args.input.display().to_string(),
        output: Some(args.output.display().to_string()),
        references: result.references,
        unique_urls: result.unique_urls,
        cited: result.cited,
        failed: result.failed,
        malformed: result.malformed,
        dry_run: false,
        urls: Vec::new(),
        timestamp: Utc::now().to_rfc3339(),
    };
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

fn dry_run(args: &ConsolidateArgs, content: &str) -> Result<()> {
    let refs = extract_references(content);
    let malformed = report_malformed(content, &refs);
    let registry = UrlRegistry::from_references(&refs);

    info!("Dry run - no citations requested, output not written");

    let summary = RunSummary {
        input: args.input.display().to_string(),
        output: None,
        references: refs.len(),
        unique_urls: registry.len(),
        cited: 0,
        failed: 0,
        malformed,
        dry_run: true,
        urls: registry.iter().map(|(_, url)| url.to_string()).collect(),
        timestamp: Utc::now().to_rfc3339(),
    };
    println!("{}", serde_json::to_string(&summary)?);

    Ok(())
}

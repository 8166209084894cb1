//! Citation sources: remote text-generation APIs that turn a URL into an
//! APA reference line.
//!
//! The pipeline only depends on [`CitationSource`]; [`ApiClient`] picks the
//! concrete HTTP client from the configured [`Provider`].

pub mod gemini;
pub mod perplexity;

use crate::config::{Provider, ProviderConfig};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

pub use gemini::GeminiClient;
pub use perplexity::PerplexityClient;

const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Per-URL failure; recovered by the failure policy, never fatal
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection failed, timed out, or the body could not be read
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response other than 429
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// HTTP 429; `retry_after` comes from the `Retry-After` header
    #[error("Rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// The model refused the prompt
    #[error("Citation generation blocked: {0}")]
    Blocked(String),

    /// Response carried no usable text
    #[error("Empty response")]
    EmptyResponse,

    /// Response JSON did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// URL is not absolute http(s); never sent to the API
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Something that can produce citation text for a URL
#[async_trait]
pub trait CitationSource: Send + Sync {
    async fn fetch_citation(&self, url: &str) -> Result<String, FetchError>;
}

/// Provider-dispatching HTTP client
pub enum ApiClient {
    Gemini(GeminiClient),
    Perplexity(PerplexityClient),
}

impl ApiClient {
    pub fn new(config: ProviderConfig) -> Result<Self, FetchError> {
        let http = build_http_client()?;
        Ok(match config.provider {
            Provider::Gemini => ApiClient::Gemini(GeminiClient::new(http, config)),
            Provider::Perplexity => ApiClient::Perplexity(PerplexityClient::new(http, config)),
        })
    }
}

#[async_trait]
impl CitationSource for ApiClient {
    async fn fetch_citation(&self, url: &str) -> Result<String, FetchError> {
        match self {
            ApiClient::Gemini(client) => client.fetch_citation(url).await,
            ApiClient::Perplexity(client) => client.fetch_citation(url).await,
        }
    }
}

fn build_http_client() -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(concat!("mdcite/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| FetchError::Network(e.to_string()))
}

/// Map a non-success response to a [`FetchError`]
pub(crate) async fn error_for_status(response: reqwest::Response) -> FetchError {
    let status = response.status();
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return FetchError::RateLimited { retry_after };
    }

    FetchError::Api {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    }
}

/// Normalize model output into a single reference line
///
/// Joins wrapped lines and strips one leading list marker (`- `, `* `,
/// `1. `) the model may add.
pub fn clean_citation(raw: &str) -> Result<String, FetchError> {
    let joined = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let text = joined.as_str();
    let text = text
        .strip_prefix("- ")
        .or_else(|| text.strip_prefix("* "))
        .unwrap_or_else(|| strip_numbering(text));
    let text = text.trim();

    if text.is_empty() {
        return Err(FetchError::EmptyResponse);
    }
    Ok(text.to_string())
}

fn strip_numbering(text: &str) -> &str {
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = text[digits..].strip_prefix(". ") {
            return rest;
        }
    }
    text
}

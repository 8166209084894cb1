//! Provider selection and credential resolution
//!
//! API key precedence: `--api-key` flag, then `MDCITE_API_KEY`, then the
//! provider's own variable. A local `.env` file is loaded at startup and
//! never overrides variables already set in the process.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Generic key variable checked before the provider-specific one
pub const API_KEY_ENV: &str = "MDCITE_API_KEY";

/// Default pause between consecutive citation requests
pub const DEFAULT_DELAY_MS: u64 = 1000;

/// Prompt sent for every URL
pub const APA_PROMPT_TEMPLATE: &str =
    "Visit this web link and generate an appropriate APA style reference line for it in markdown format: {url}";

/// Remote text-generation API used to produce citations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google Gemini `generateContent`
    #[default]
    Gemini,
    /// Perplexity chat completions (OpenAI-compatible)
    Perplexity,
}

impl Provider {
    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Gemini => "gemini-1.5-pro-latest",
            Provider::Perplexity => "sonar",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Provider::Gemini => "https://generativelanguage.googleapis.com",
            Provider::Perplexity => "https://api.perplexity.ai",
        }
    }

    pub fn env_var(self) -> &'static str {
        match self {
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Perplexity => "PERPLEXITY_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Gemini => write!(f, "gemini"),
            Provider::Perplexity => write!(f, "perplexity"),
        }
    }
}

/// Everything a provider client needs to talk to its API
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider: Provider,
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl ProviderConfig {
    /// Fill unset model/base URL with the provider defaults
    pub fn new(
        provider: Provider,
        api_key: String,
        model: Option<String>,
        base_url: Option<String>,
    ) -> Self {
        Self {
            provider,
            api_key,
            model: model.unwrap_or_else(|| provider.default_model().to_string()),
            base_url: base_url
                .unwrap_or_else(|| provider.default_base_url().to_string())
                .trim_end_matches('/')
                .to_string(),
        }
    }
}

/// Load `.env` from the working directory (or a parent) if present
///
/// Returns the loaded path, or `None` when there is no `.env` file.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(e),
    }
}

/// Resolve the API key from the flag or the process environment
pub fn resolve_api_key(flag: Option<&str>, provider: Provider) -> Result<String, AppError> {
    resolve_api_key_with(flag, provider, |name| env::var(name).ok())
}

/// Resolve the API key using `lookup` for environment access
pub fn resolve_api_key_with<F>(
    flag: Option<&str>,
    provider: Provider,
    lookup: F,
) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    flag.map(str::to_string)
        .into_iter()
        .chain(lookup(API_KEY_ENV))
        .chain(lookup(provider.env_var()))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
        .ok_or_else(|| AppError::MissingCredential {
            provider: provider.to_string(),
            env_var: provider.env_var(),
        })
}

/// Render the citation prompt for one URL
pub fn citation_prompt(url: &str) -> String {
    APA_PROMPT_TEMPLATE.replace("{url}", url)
}

//! Fatal error kinds for a consolidation run

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort the run with a non-zero exit
#[derive(Debug, Error)]
pub enum AppError {
    /// Input Markdown file does not exist
    #[error("Input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// No API key from flag, environment, or .env
    #[error("{provider} API key not found. Pass --api-key or set {env_var} (or MDCITE_API_KEY)")]
    MissingCredential {
        provider: String,
        env_var: &'static str,
    },
}

//! mdcite CLI
//!
//! Rewrites `([label](url))` source citations into numbered links and
//! appends a Sources section with generated APA references.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mdcite::config::load_dotenv;
use mdcite::consolidate::{run_consolidate, ConsolidateArgs};

#[derive(Parser)]
#[command(name = "mdcite")]
#[command(author = "RoyalBit Inc.")]
#[command(version)]
#[command(about = "Consolidate inline Markdown source citations into numbered footnotes")]
#[command(long_about = "Finds ([label](url)) citations, asks an LLM for one APA reference per unique URL,\nand rewrites them as [n](#source-n) links with a Sources section.\n\nAPI key: --api-key, MDCITE_API_KEY, GEMINI_API_KEY / PERPLEXITY_API_KEY, or .env")]
struct Cli {
    #[command(flatten)]
    args: ConsolidateArgs,

    /// Verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Before parsing so .env can feed --api-key and RUST_LOG
    let dotenv = load_dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dotenv {
        Ok(Some(path)) => tracing::debug!(path = %path.display(), "Loaded .env"),
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env"),
    }

    run_consolidate(cli.args).await
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "mdcite=debug" } else { "mdcite=info" };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

pub mod batch;
pub mod classify;
pub mod cli;
pub mod config;
pub mod convert;
pub mod error;
pub mod extract;
pub mod mapping;
pub mod naming;
pub mod placement;
pub mod reorganize;
pub mod report;

use clap::Parser;
use cli::Cli;
use tracing_subscriber::EnvFilter;

pub use error::{DocsortError, Result};

pub async fn run() -> Result<()> {
    // A missing .env is fine; flags and the environment still apply
    let _ = dotenvy::dotenv();

    // Default: warn for dependencies, info for our own summaries
    // Use RUST_LOG=debug for per-document logs
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,docsort=info")),
        )
        .init();

    Cli::parse().run().await
}

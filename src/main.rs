//! # LLM Gateway
//!
//! Runs a prompt against a configured target.
//!
//! ```bash
//! # Single configured target, or `default_target` set
//! llm-gateway "Summarize RFC 9110 in one line"
//!
//! # Named target, streamed
//! llm-gateway --config gateway.toml --target claude --stream "Write a haiku"
//!
//! # List targets
//! llm-gateway targets
//! ```

use clap::Parser;

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = cli.execute().await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

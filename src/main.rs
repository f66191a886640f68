//! loratags - LoRA trigger-word lookup and caching for node-based image pipelines
//!
//! loratags provides:
//! - A tag cache keyed by LoRA file name, filled by content-hash lookups
//! - The Fetch Lora Tags, Lora Selector and LoraLoaderTagsQuery nodes
//! - A node registry describing each node's typed slots
//! - A CLI that runs every node outside the host

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backends;
mod cache;
mod cli;
mod config;
mod core;
mod nodes;

fn init_logging(quiet: bool, verbose: bool) {
    let default_level = if verbose {
        "loratags=debug"
    } else if quiet {
        "loratags=warn,loratags::tags=info"
    } else {
        "loratags=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.quiet, cli.verbose);
    cli::run(cli)
}

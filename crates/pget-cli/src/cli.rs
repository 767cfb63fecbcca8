//! CLI for the pget downloader.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use pget_core::config;
use pget_core::session::Session;
use pget_core::url_model;
use std::path::Path;

/// Resumable multi-connection file downloader.
#[derive(Debug, Parser)]
#[command(name = "pget")]
#[command(about = "pget: resumable multi-connection file downloader", long_about = None)]
pub struct Cli {
    /// Direct HTTP/HTTPS URL, or a file with one mirror URL per line.
    #[arg(value_name = "URL|URL-LIST-FILE")]
    pub source: Option<String>,

    /// Maximum concurrent connections.
    #[arg(value_name = "MAX-CONCURRENT-CONNECTIONS", default_value = "1")]
    pub connections: usize,

    /// Override the configured chunk size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<u64>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let Some(source) = cli.source else {
        // No arguments: print usage and exit 0.
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut cfg = config::load_or_init()?;
    if let Some(chunk_size) = cli.chunk_size {
        cfg.chunk_size = chunk_size;
    }
    tracing::debug!("loaded config: {:?}", cfg);

    let urls = if url_model::looks_like_url(&source) {
        vec![source]
    } else {
        url_model::load_url_list(Path::new(&source))?
    };

    let session = Session {
        urls,
        connections: cli.connections,
        config: cfg,
        download_dir: std::env::current_dir().context("cannot determine working directory")?,
    };
    session.run()
}

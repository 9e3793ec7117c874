//! CLI entry point for the fetch tool.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fetch_core::{Database, DiskSink, FetchService, HttpFetcher, RetryPolicy, SqliteMetadataStore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn};

mod cli;
mod config;
mod output;

use cli::Args;
use config::{AppConfig, load_file_config};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let file_config = load_file_config(args.config.as_deref())?;
    let config = AppConfig::resolve(&args, file_config.as_ref());
    debug!(?config, "configuration resolved");

    let db = Database::new(&config.dsn)
        .await
        .with_context(|| format!("Failed to open database '{}'", config.dsn.display()))?;

    let fetcher = HttpFetcher::with_timeouts(
        RetryPolicy::with_max_attempts(config.max_attempts),
        config.connect_timeout_secs,
        config.read_timeout_secs,
    )
    .context("Failed to build HTTP client")?;

    let service = FetchService::new(
        Arc::new(fetcher),
        Arc::new(DiskSink::new(&config.download_path)),
        Arc::new(SqliteMetadataStore::new(db.clone())),
    )
    .with_concurrency(config.concurrency)?
    .with_span(info_span!("fetch"));

    let outcome = if args.metadata {
        print_metadata(&service, &args.sites).await
    } else {
        fetch_sites(&service, &args.sites).await
    };

    db.close().await;
    outcome
}

async fn fetch_sites(service: &FetchService, sites: &[String]) -> Result<ExitCode> {
    info!(sites = sites.len(), "fetching sites");

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling fetch");
            on_interrupt.cancel();
        }
    });

    let result = service.fetch_all(sites, &cancel).await;
    interrupt.abort();

    match result {
        Ok(()) => {
            info!(sites = sites.len(), "all sites fetched");
            Ok(ExitCode::SUCCESS)
        }
        Err(batch) => {
            error!(
                failed = batch.failures().len(),
                cancelled = batch.is_cancelled(),
                "fetch finished with errors"
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn print_metadata(service: &FetchService, sites: &[String]) -> Result<ExitCode> {
    let records = service.metadata_for(sites).await?;
    debug!(found = records.len(), "metadata loaded");
    print!("{}", output::format_metadata(&records));
    Ok(ExitCode::SUCCESS)
}

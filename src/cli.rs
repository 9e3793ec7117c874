//! CLI argument definitions using clap derive macros.
//!
//! Settings that can also come from the config file are optional here so the
//! merge in `config` can tell "not given" from "given".

use std::path::PathBuf;

use clap::Parser;

/// Fetch web pages, store them on disk and record their link and image counts.
#[derive(Parser, Debug)]
#[command(name = "fetch")]
#[command(author, version, about)]
pub struct Args {
    /// Sites to fetch (absolute URLs); optional with --metadata
    #[arg(required_unless_present = "metadata", value_name = "SITES")]
    pub sites: Vec<String>,

    /// Print stored metadata for the sites instead of fetching them
    #[arg(long)]
    pub metadata: bool,

    /// SQLite database file [default: fetch.sqlite]
    #[arg(long, env = "FETCH_DSN", value_name = "PATH")]
    pub dsn: Option<PathBuf>,

    /// Directory fetched pages are written to [default: .]
    #[arg(long, env = "FETCH_DOWNLOAD_PATH", value_name = "DIR")]
    pub download_path: Option<PathBuf>,

    /// Maximum sites fetched at once (1-100) [default: 100]
    #[arg(short = 'c', long, env = "FETCH_CONCURRENCY", value_parser = clap::value_parser!(u8).range(1..=100))]
    pub concurrency: Option<u8>,

    /// Attempts per site for transient failures (1-10) [default: 5]
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: Option<u8>,

    /// HTTP connect timeout in seconds (1-3600) [default: 30]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub connect_timeout_secs: Option<u64>,

    /// HTTP request timeout in seconds, body included (1-3600) [default: 300]
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub read_timeout_secs: Option<u64>,

    /// Config file to load instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

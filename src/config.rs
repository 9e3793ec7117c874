//! Application configuration: TOML file defaults merged under CLI values.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use fetch_core::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, DEFAULT_MAX_ATTEMPTS, MAX_CONCURRENCY,
    READ_TIMEOUT_SECS,
};

use crate::cli::Args;

const DEFAULT_DSN: &str = "fetch.sqlite";
const DEFAULT_DOWNLOAD_PATH: &str = ".";

/// Upper bound for `max_attempts`.
const MAX_ATTEMPTS_LIMIT: u32 = 10;

/// Upper bound for HTTP timeouts, in seconds.
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Defaults read from `config.toml`.
///
/// ```toml
/// dsn = "/var/lib/fetch/fetch.sqlite"
/// download_path = "/var/lib/fetch/pages"
/// concurrency = 20
/// max_attempts = 3
/// connect_timeout_secs = 10
/// read_timeout_secs = 120
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// SQLite database file.
    pub dsn: Option<PathBuf>,
    /// Directory fetched pages are written to.
    pub download_path: Option<PathBuf>,
    /// Maximum sites fetched at once.
    pub concurrency: Option<usize>,
    /// Attempts per site for transient failures.
    pub max_attempts: Option<u32>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP request timeout in seconds.
    pub read_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Parses a TOML document.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates the file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml(&raw)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    /// Checks values against the same ranges the CLI enforces.
    pub fn validate(&self) -> Result<()> {
        if let Some(concurrency) = self.concurrency
            && !(1..=MAX_CONCURRENCY).contains(&concurrency)
        {
            bail!(
                "Invalid config value for `concurrency`: {concurrency}. Expected range: 1..={MAX_CONCURRENCY}"
            );
        }
        if let Some(max_attempts) = self.max_attempts
            && !(1..=MAX_ATTEMPTS_LIMIT).contains(&max_attempts)
        {
            bail!(
                "Invalid config value for `max_attempts`: {max_attempts}. Expected range: 1..={MAX_ATTEMPTS_LIMIT}"
            );
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &str, value: Option<u64>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(1..=MAX_TIMEOUT_SECS).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: 1..={MAX_TIMEOUT_SECS}");
    }
    Ok(())
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/fetch/config.toml`
/// 2. `$HOME/.config/fetch/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config_home).join("fetch").join("config.toml"));
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("fetch")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads the config file named on the command line, or the default one if
/// it exists.
///
/// An explicit path must exist; a missing default file means no file config.
pub fn load_file_config(explicit: Option<&Path>) -> Result<Option<FileConfig>> {
    if let Some(path) = explicit {
        return FileConfig::load(path).map(Some);
    }

    let Some(path) = resolve_default_config_path() else {
        return Ok(None);
    };
    if !path.exists() {
        debug!(path = %path.display(), "no config file");
        return Ok(None);
    }
    FileConfig::load(&path).map(Some)
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub dsn: PathBuf,
    pub download_path: PathBuf,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl AppConfig {
    /// Merges CLI values over file values over built-in defaults.
    #[must_use]
    pub fn resolve(args: &Args, file: Option<&FileConfig>) -> Self {
        let file = file.cloned().unwrap_or_default();

        Self {
            dsn: args
                .dsn
                .clone()
                .or(file.dsn)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DSN)),
            download_path: args
                .download_path
                .clone()
                .or(file.download_path)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_PATH)),
            concurrency: args
                .concurrency
                .map(usize::from)
                .or(file.concurrency)
                .unwrap_or(DEFAULT_CONCURRENCY),
            max_attempts: args
                .max_attempts
                .map(u32::from)
                .or(file.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            connect_timeout_secs: args
                .connect_timeout_secs
                .or(file.connect_timeout_secs)
                .unwrap_or(CONNECT_TIMEOUT_SECS),
            read_timeout_secs: args
                .read_timeout_secs
                .or(file.read_timeout_secs)
                .unwrap_or(READ_TIMEOUT_SECS),
        }
    }
}

//! # thaw-cli
//!
//! Command-line interface for archive-tier recall.
//!
//! ## Commands
//!
//! A single `--command` selector names the operation; run `thaw` with no
//! command to list them. Underscore spellings (`list_buckets`) are accepted.
//!
//! ## Configuration
//!
//! Connection settings come from flags, falling back to environment variables:
//!
//! - `DS3_ENDPOINT` - S3-compatible endpoint URL
//! - `DS3_PROXY` - HTTP proxy URL
//! - `AWS_REGION` - Region (default: `us-west-2`)

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;
pub mod output;
pub mod registry;
pub mod session;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use thaw_core::{LogFormat, S3Config};
use thaw_core::fanout::DEFAULT_CONCURRENCY;
use thaw_core::store::s3::{DEFAULT_PROFILE, DEFAULT_REGION};

/// thaw - recall, verify and fetch archive-tier objects.
#[derive(Debug, Parser)]
#[command(name = "thaw")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Operation to run; use `list-commands` for valid commands.
    #[arg(long, default_value = "")]
    pub command: String,

    /// URL of the S3-compatible endpoint.
    #[arg(long, env = "DS3_ENDPOINT")]
    pub endpoint: Option<String>,

    /// HTTP proxy to route through.
    #[arg(long, env = "DS3_PROXY")]
    pub proxy: Option<String>,

    /// Region.
    #[arg(long, env = "AWS_REGION", default_value = DEFAULT_REGION)]
    pub region: String,

    /// Credential profile.
    #[arg(long, default_value = DEFAULT_PROFILE)]
    pub profile: String,

    /// Bucket to operate on.
    #[arg(long)]
    pub bucket: Option<String>,

    /// Object key.
    #[arg(long)]
    pub key: Option<String>,

    /// Match objects whose key starts with this prefix.
    #[arg(long)]
    pub prefix: Option<String>,

    /// Download objects after they are recalled.
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub download: bool,

    /// Accept self-signed certificates.
    #[arg(long)]
    pub no_verify_ssl: bool,

    /// Delete objects that fail verification.
    #[arg(long)]
    pub delete_on_fail: bool,

    /// Report output file (default: stdout).
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Directory downloaded objects are written to.
    #[arg(long, default_value = ".")]
    pub download_dir: PathBuf,

    /// Maximum keys processed concurrently.
    #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Give up waiting for recalls after this many seconds.
    #[arg(long)]
    pub wait_timeout: Option<u64>,

    /// Log output format.
    #[arg(long, default_value = "pretty")]
    pub log_format: LogFormatArg,
}

impl Cli {
    /// Get the effective configuration.
    #[must_use]
    pub fn config(&self) -> Config {
        Config {
            command: non_empty(Some(&self.command)),
            s3: S3Config {
                endpoint: non_empty(self.endpoint.as_ref()),
                region: non_empty(Some(&self.region)).unwrap_or_else(|| DEFAULT_REGION.to_string()),
                profile: non_empty(Some(&self.profile))
                    .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
                proxy: non_empty(self.proxy.as_ref()),
                skip_tls_verification: self.no_verify_ssl,
            },
            bucket: non_empty(self.bucket.as_ref()),
            key: non_empty(self.key.as_ref()),
            prefix: non_empty(self.prefix.as_ref()),
            download: self.download,
            delete_on_fail: self.delete_on_fail,
            out: self.out.clone(),
            download_dir: self.download_dir.clone(),
            concurrency: self.concurrency.max(1),
            wait_timeout: self.wait_timeout.map(Duration::from_secs),
            log_format: self.log_format.into(),
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty()).cloned()
}

/// Renders a command failure for stderr.
///
/// When a recognized service error code is anywhere in the chain, its friendly
/// label and code lead the message; otherwise the full context chain is printed.
#[must_use]
pub fn describe_error(err: &anyhow::Error) -> String {
    let decoded = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<thaw_core::Error>())
        .and_then(|cause| Some((cause.friendly_label()?, cause.code()?)));
    match decoded {
        Some((label, code)) => format!("{label} ({code}): {err:#}"),
        None => format!("{err:#}"),
    }
}

/// Log format flag values.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable logs.
    #[default]
    Pretty,
    /// JSON structured logs.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Operation selector; `None` lists the commands.
    pub command: Option<String>,
    /// Connection settings.
    pub s3: S3Config,
    /// Bucket.
    pub bucket: Option<String>,
    /// Object key.
    pub key: Option<String>,
    /// Key prefix.
    pub prefix: Option<String>,
    /// Download after recall.
    pub download: bool,
    /// Delete objects that fail verification.
    pub delete_on_fail: bool,
    /// Report output file.
    pub out: Option<PathBuf>,
    /// Download directory.
    pub download_dir: PathBuf,
    /// Fan-out concurrency limit.
    pub concurrency: usize,
    /// Optional polling deadline.
    pub wait_timeout: Option<Duration>,
    /// Log format.
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            command: None,
            s3: S3Config::default(),
            bucket: None,
            key: None,
            prefix: None,
            download: true,
            delete_on_fail: false,
            out: None,
            download_dir: PathBuf::from("."),
            concurrency: DEFAULT_CONCURRENCY,
            wait_timeout: None,
            log_format: LogFormat::default(),
        }
    }
}

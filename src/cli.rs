//! Command-line interface definitions for linkdupe.
//!
//! Global options (verbosity, color, config file) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Replace duplicate files under a tree by hardlinks
//! linkdupe dedup /srv/backups/2024
//!
//! # Link new files to an older, untouched snapshot
//! linkdupe dedup /srv/backups/2024 --reference /srv/backups/2023
//!
//! # See what would happen, as JSON
//! linkdupe dedup /srv/backups/2024 --dry-run --output json
//!
//! # Reconcile files left behind by an interrupted run
//! linkdupe recover /srv/backups/2024
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::Config;
use crate::dedup::BucketPolicy;

/// Replace duplicate files by hardlinks.
///
/// linkdupe walks a directory tree, finds files with identical content and
/// attributes, and replaces each later copy by a hardlink to the first one.
#[derive(Debug, Parser)]
#[command(name = "linkdupe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report fatal errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (default: platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace duplicates under a directory by hardlinks
    Dedup(DedupArgs),
    /// Compare two files the way dedup would
    Compare(CompareArgs),
    /// Reconcile parked files left by an interrupted run
    Recover(RecoverArgs),
}

/// Arguments for the dedup subcommand.
#[derive(Debug, Args)]
pub struct DedupArgs {
    /// Directory whose duplicates are replaced
    #[arg(value_name = "TARGET")]
    pub target: PathBuf,

    /// Read-only directories whose files may be linked to but are never modified
    ///
    /// Can be specified multiple times. Indexed in the order given.
    #[arg(short, long = "reference", value_name = "DIR")]
    pub references: Vec<PathBuf>,

    /// Decide everything but change nothing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Abort on the first file that cannot be processed
    #[arg(long)]
    pub strict: bool,

    /// Handling of files whose attributes collide but whose content differs
    #[arg(long, value_enum, value_name = "POLICY")]
    pub bucket_policy: Option<BucketPolicy>,

    /// Minimum file size to consider (e.g., 1KB, 1MB, 1GB)
    ///
    /// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, value_name = "SIZE", value_parser = parse_size)]
    pub min_size: Option<u64>,

    /// Gitignore-style patterns to skip (can be specified multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    pub ignore_patterns: Vec<String>,

    /// Output format for the run summary
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Do not display a progress spinner
    #[arg(long)]
    pub no_progress: bool,
}

impl DedupArgs {
    /// Apply flags given on the command line on top of `config`.
    #[must_use]
    pub fn apply(&self, mut config: Config) -> Config {
        if self.dry_run {
            config.dry_run = true;
        }
        if self.strict {
            config.strict = true;
        }
        if let Some(policy) = self.bucket_policy {
            config.bucket_policy = policy;
        }
        if self.min_size.is_some() {
            config.min_size = self.min_size;
        }
        config
            .ignore_patterns
            .extend(self.ignore_patterns.iter().cloned());
        config
    }
}

/// Arguments for the compare subcommand.
#[derive(Debug, Args)]
pub struct CompareArgs {
    /// First file
    #[arg(value_name = "A")]
    pub left: PathBuf,

    /// Second file
    #[arg(value_name = "B")]
    pub right: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the recover subcommand.
#[derive(Debug, Args)]
pub struct RecoverArgs {
    /// Directory to search for parked files
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse a human-readable size string into bytes.
///
/// Supports suffixes: B, KB, KiB, MB, MiB, GB, GiB, TB, TiB
/// Case-insensitive. Numbers without suffix are treated as bytes.
///
/// # Examples
///
/// ```
/// use linkdupe::cli::parse_size;
///
/// assert_eq!(parse_size("1024").unwrap(), 1024);
/// assert_eq!(parse_size("1KB").unwrap(), 1000);
/// assert_eq!(parse_size("1KiB").unwrap(), 1024);
/// assert_eq!(parse_size("1MiB").unwrap(), 1_048_576);
/// ```
///
/// # Errors
///
/// Returns an error if the string is empty, contains an invalid number,
/// a negative number, or an unknown size suffix.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("Size cannot be empty".to_string());
    }

    let (num_str, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(idx) => (&s[..idx], s[idx..].trim().to_uppercase()),
        None => (s, String::new()),
    };

    let num: f64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: '{num_str}'"))?;

    if num < 0.0 {
        return Err("Size cannot be negative".to_string());
    }

    let multiplier: u64 = match suffix.as_str() {
        "" | "B" => 1,
        "KB" | "K" => 1_000,
        "KIB" => 1_024,
        "MB" | "M" => 1_000_000,
        "MIB" => 1_048_576,
        "GB" | "G" => 1_000_000_000,
        "GIB" => 1_073_741_824,
        "TB" | "T" => 1_000_000_000_000,
        "TIB" => 1_099_511_627_776,
        _ => return Err(format!("Unknown size suffix: '{suffix}'")),
    };

    Ok((num * multiplier as f64) as u64)
}

//! linkdupe - replace byte-identical files with hardlinks.
//!
//! The library walks a target directory tree, groups files by cheap
//! attributes (size, access rights, hidden flag, permission bits), confirms
//! equality with SHA-1 digests computed only when needed, and replaces each
//! duplicate by a hardlink to the first equivalent file seen. Optional
//! read-only reference trees contribute link targets without being modified.
//!
//! See [`dedup::DedupEngine`] for the core and [`run_app`] for the CLI flow.

pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io;
use std::sync::Arc;

use anyhow::Context;

use crate::cli::{Cli, Commands, CompareArgs, DedupArgs, OutputFormat, RecoverArgs};
use crate::config::Config;
use crate::dedup::{compare_paths, recover_parked, DedupEngine};
use crate::error::ExitCode;
use crate::output::{JsonOutput, TextOutput};
use crate::progress::{Progress, ProgressCallback};
use crate::scanner::{Hasher, Walker};
use crate::signal::ShutdownHandler;

/// Run the application for parsed command-line arguments.
///
/// # Errors
///
/// Returns an error for invalid configuration, missing roots, unreadable
/// files in `compare`, or the first per-file error in strict mode.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;

    match &cli.command {
        Commands::Dedup(args) => run_dedup(args, config, cli.quiet),
        Commands::Compare(args) => run_compare(args, &config),
        Commands::Recover(args) => run_recover(args, &config),
    }
}

fn run_dedup(args: &DedupArgs, config: Config, quiet: bool) -> anyhow::Result<ExitCode> {
    let config = args.apply(config);
    let handler = signal::install_handler().unwrap_or_else(|e| {
        log::warn!("{}; Ctrl+C will terminate immediately", e);
        ShutdownHandler::new()
    });

    let walker = Walker::new(config.walker_config()).with_shutdown_flag(handler.get_flag());
    let hide_progress = args.no_progress || quiet || args.output == OutputFormat::Json;
    let progress: Arc<dyn ProgressCallback> = Arc::new(Progress::new(hide_progress));
    let mut engine = DedupEngine::new(walker, config.engine_config())
        .with_shutdown_flag(handler.get_flag())
        .with_progress_callback(progress);

    if config.dry_run {
        log::info!("Dry run: no file will be changed");
    }

    engine
        .index_readonly(&args.references)
        .context("failed to index reference directories")?;
    if !engine.summary().interrupted {
        engine
            .dedup(&args.target)
            .with_context(|| format!("failed to deduplicate {}", args.target.display()))?;
    }

    let summary = engine.into_summary();
    let exit_code = ExitCode::from_summary(&summary);
    let written = match args.output {
        OutputFormat::Text => TextOutput::write_summary(&summary, io::stdout().lock()),
        OutputFormat::Json => JsonOutput::new("dedup", &summary, exit_code).write_to(io::stdout().lock()),
    };
    written.context("failed to write report")?;

    Ok(exit_code)
}

fn run_compare(args: &CompareArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let hasher = Hasher::with_buffer_size(config.hash_buffer_size);
    let comparison = compare_paths(&args.left, &args.right, &hasher).with_context(|| {
        format!(
            "failed to compare {} and {}",
            args.left.display(),
            args.right.display()
        )
    })?;

    let written = match args.output {
        OutputFormat::Text => TextOutput::write_comparison(&comparison, io::stdout().lock()),
        OutputFormat::Json => {
            JsonOutput::new("compare", &comparison, ExitCode::Success).write_to(io::stdout().lock())
        }
    };
    written.context("failed to write report")?;

    Ok(ExitCode::Success)
}

fn run_recover(args: &RecoverArgs, config: &Config) -> anyhow::Result<ExitCode> {
    let hasher = Hasher::with_buffer_size(config.hash_buffer_size);
    let report = recover_parked(&args.root, &hasher)
        .with_context(|| format!("failed to recover {}", args.root.display()))?;

    let exit_code = if report.is_clean() {
        ExitCode::Success
    } else {
        ExitCode::PartialSuccess
    };
    let written = match args.output {
        OutputFormat::Text => TextOutput::write_recovery(&report, io::stdout().lock()),
        OutputFormat::Json => JsonOutput::new("recover", &report, exit_code).write_to(io::stdout().lock()),
    };
    written.context("failed to write report")?;

    Ok(exit_code)
}

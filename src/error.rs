//! Structured error handling and exit codes.

use serde::Serialize;

use crate::dedup::{DedupError, RunSummary};
use crate::scanner::ScanError;

/// Process exit codes.
///
/// - 0: every file was processed
/// - 1: fatal error (bad arguments, missing root, strict-mode abort)
/// - 3: the run completed but some files failed
/// - 130: interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Every file was processed.
    Success = 0,
    /// An error stopped the run.
    GeneralError = 1,
    /// The run completed with per-file failures.
    PartialSuccess = 3,
    /// The run was interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "LD000",
            Self::GeneralError => "LD001",
            Self::PartialSuccess => "LD003",
            Self::Interrupted => "LD130",
        }
    }

    /// Exit code for a finished run.
    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.interrupted {
            Self::Interrupted
        } else if summary.has_failures() {
            Self::PartialSuccess
        } else {
            Self::Success
        }
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "LD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
    /// The path the error is about, when known
    pub path: Option<String>,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            path: error_path(err).map(|p| p.display().to_string()),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}

fn error_path(err: &anyhow::Error) -> Option<&std::path::Path> {
    err.chain().find_map(|cause| {
        if let Some(scan) = cause.downcast_ref::<ScanError>() {
            return Some(scan.path());
        }
        match cause.downcast_ref::<DedupError>()? {
            DedupError::Metadata { path, .. }
            | DedupError::Park { path, .. }
            | DedupError::Link { path, .. }
            | DedupError::Restore { path, .. }
            | DedupError::Cleanup { path, .. } => Some(path.as_path()),
            DedupError::NoParkingName(path) => Some(path.as_path()),
            DedupError::Scan(scan) => Some(scan.path()),
            DedupError::Hash(_) => None,
        }
    })
}

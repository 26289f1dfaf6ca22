//! Reconciliation of files parked by an interrupted replacement.
//!
//! A crash between parking a duplicate and removing it leaves a
//! `<name>.<digits>.aside` file next to `<name>`. For each one found:
//!
//! - `<name>` is missing: the parked file is renamed back ([`RecoveryAction::Restored`]).
//! - `<name>` exists and is equivalent: the link had succeeded, so the parked
//!   copy is removed ([`RecoveryAction::Cleaned`]).
//! - otherwise the parked file is left alone ([`RecoveryAction::Conflict`]).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use super::descriptor::{compare, FileDescriptor};
use super::engine::FailureRecord;
use super::replace::{is_parked_name, parked_original};
use super::DedupError;
use crate::scanner::{Hasher, ScanError};

/// Errors raised while reconciling a single parked file.
#[derive(thiserror::Error, Debug)]
pub enum RecoverError {
    /// The parked file or its original could not be compared.
    #[error(transparent)]
    Compare(#[from] DedupError),

    /// Renaming or removing the parked file failed.
    #[error("cannot reconcile {path}: {source}")]
    Io {
        /// The parked file
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

/// What was done with one parked file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryAction {
    /// Moved back to its original name
    Restored,
    /// Removed, since the original already holds equivalent content
    Cleaned,
    /// Left in place; the original holds different content
    Conflict,
}

impl std::fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryAction::Restored => write!(f, "restored"),
            RecoveryAction::Cleaned => write!(f, "cleaned"),
            RecoveryAction::Conflict => write!(f, "conflict"),
        }
    }
}

/// One reconciled parked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryEntry {
    /// The parked file
    pub parked: PathBuf,
    /// The path it was parked from
    pub original: PathBuf,
    /// What was done
    pub action: RecoveryAction,
}

/// Result of a recovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Reconciled files, in walk order
    pub entries: Vec<RecoveryEntry>,
    /// Parked files or directories that could not be handled
    pub failures: Vec<FailureRecord>,
}

impl RecoveryReport {
    /// Number of entries with the given action.
    #[must_use]
    pub fn count(&self, action: RecoveryAction) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    /// Whether every parked file was resolved.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.count(RecoveryAction::Conflict) == 0
    }
}

/// Reconcile every parked file under `root`.
///
/// # Errors
///
/// Returns [`ScanError`] if `root` is missing or not a directory. Problems
/// with individual files are collected in the report.
pub fn recover_parked(root: &Path, hasher: &Hasher) -> Result<RecoveryReport, ScanError> {
    let metadata = fs::metadata(root).map_err(|e| ScanError::from_io(root, e))?;
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let mut report = RecoveryReport::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter();

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root).to_path_buf();
                log::warn!("Cannot walk {}: {}", path.display(), e);
                report.failures.push(FailureRecord {
                    path,
                    error: e.to_string(),
                });
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_parked_name(entry.file_name()) {
            continue;
        }

        let parked = entry.into_path();
        let Some(original) = parked_original(&parked) else {
            continue;
        };
        match reconcile(&parked, &original, hasher) {
            Ok(action) => {
                log::info!("{}: {}", parked.display(), action);
                report.entries.push(RecoveryEntry {
                    parked,
                    original,
                    action,
                });
            }
            Err(e) => {
                log::warn!("{}: {}", parked.display(), e);
                report.failures.push(FailureRecord {
                    path: parked,
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(report)
}

fn reconcile(parked: &Path, original: &Path, hasher: &Hasher) -> Result<RecoveryAction, RecoverError> {
    let io_error = |source: io::Error| RecoverError::Io {
        path: parked.to_path_buf(),
        source,
    };

    match fs::symlink_metadata(original) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            fs::rename(parked, original).map_err(io_error)?;
            return Ok(RecoveryAction::Restored);
        }
        Err(e) => return Err(DedupError::metadata(original, e).into()),
        Ok(metadata) if !metadata.is_file() => return Ok(RecoveryAction::Conflict),
        Ok(_) => {}
    }

    let mut left = FileDescriptor::inspect(original)?;
    let mut right = FileDescriptor::inspect(parked)?;
    if compare(&mut left, &mut right, hasher)?.is_equivalent() {
        fs::remove_file(parked).map_err(io_error)?;
        Ok(RecoveryAction::Cleaned)
    } else {
        Ok(RecoveryAction::Conflict)
    }
}

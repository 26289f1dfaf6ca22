//! Hardlink deduplication engine.
//!
//! This module provides functionality for:
//! - Cheap equivalence keys and lazy, memoized content digests ([`descriptor`])
//! - The candidate index of representatives ([`index`])
//! - Crash-tolerant replacement of a duplicate by a hardlink ([`replace`])
//! - The per-file lookup-or-link decision over whole trees ([`engine`])
//! - Reconciliation of files parked by an interrupted replacement ([`recover`])

pub mod descriptor;
pub mod engine;
pub mod index;
pub mod recover;
pub mod replace;

use std::io;
use std::path::{Path, PathBuf};

use crate::scanner::{HashError, ScanError};

pub use descriptor::{compare, compare_paths, Comparison, Equivalence, EquivalenceKey, FileDescriptor};
pub use engine::{DedupEngine, EngineConfig, FailureRecord, FileOutcome, RunSummary, SkipReason};
pub use index::{BucketPolicy, CandidateIndex, Origin, Representative};
pub use recover::{recover_parked, RecoverError, RecoveryAction, RecoveryEntry, RecoveryReport};
pub use replace::{replace_with_hardlink, LinkOps, StdLinkOps};

/// Errors raised while deciding on or deduplicating a single file.
#[derive(thiserror::Error, Debug)]
pub enum DedupError {
    /// File metadata could not be read.
    #[error("cannot read metadata for {path}: {source}")]
    Metadata {
        /// Path whose metadata was requested
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// File content could not be read in full for hashing.
    #[error("cannot hash file: {0}")]
    Hash(#[from] HashError),

    /// A directory could not be walked.
    #[error(transparent)]
    Scan(#[from] ScanError),

    /// No unused parking name was found next to the duplicate.
    #[error("no free parking name next to {0}")]
    NoParkingName(PathBuf),

    /// The duplicate could not be moved aside; nothing was changed.
    #[error("cannot move {path} aside to {temp}: {source}")]
    Park {
        /// The duplicate
        path: PathBuf,
        /// The parking location
        temp: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The hardlink could not be created; the duplicate was restored.
    #[error("cannot link {path} to {target} (original restored): {source}")]
    Link {
        /// The duplicate, restored in place
        path: PathBuf,
        /// The representative the link should have pointed to
        target: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },

    /// The hardlink failed and the parked duplicate could not be moved back.
    /// The file content now lives only at `temp`.
    #[error("cannot restore {path} from {temp} after link failure ({link_error}): {source}")]
    Restore {
        /// The original location, currently empty
        path: PathBuf,
        /// Where the content is parked
        temp: PathBuf,
        /// The error that made the link fail
        link_error: io::Error,
        /// The error that made the restore fail
        #[source]
        source: io::Error,
    },

    /// The hardlink was created but the parked copy could not be removed.
    #[error("linked {path} but cannot remove parked copy {temp}: {source}")]
    Cleanup {
        /// The newly linked path
        path: PathBuf,
        /// The leftover parked copy
        temp: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl DedupError {
    /// Build a metadata error for `path`.
    #[must_use]
    pub fn metadata(path: &Path, source: io::Error) -> Self {
        Self::Metadata {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Parked file left behind by this failure, if any.
    #[must_use]
    pub fn parked_file(&self) -> Option<&Path> {
        match self {
            Self::Restore { temp, .. } | Self::Cleanup { temp, .. } => Some(temp),
            _ => None,
        }
    }
}

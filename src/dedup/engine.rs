//! The dedup engine: per-file lookup-or-link over directory trees.
//!
//! # Overview
//!
//! [`DedupEngine`] owns a [`CandidateIndex`] for the lifetime of one run.
//! Reference trees are indexed first with [`DedupEngine::index_readonly`]; the
//! target tree is then processed with [`DedupEngine::dedup`], where every file
//! either becomes a representative or is replaced by a hardlink to the
//! earliest-registered equivalent file.
//!
//! Each file is a unit of failure: an error on one file is recorded in the
//! [`RunSummary`] and the walk continues, unless [`EngineConfig::strict`] is
//! set, in which case the first error aborts the run.
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::dedup::{DedupEngine, EngineConfig};
//! use linkdupe::scanner::{Walker, WalkerConfig};
//! use std::path::{Path, PathBuf};
//!
//! let walker = Walker::new(WalkerConfig::default());
//! let mut engine = DedupEngine::new(walker, EngineConfig::default());
//! engine.index_readonly(&[PathBuf::from("/srv/mirror-2023")]).unwrap();
//! engine.dedup(Path::new("/srv/mirror-2024")).unwrap();
//! println!("{} files linked", engine.summary().linked);
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use super::descriptor::{compare, Equivalence, FileDescriptor};
use super::index::{BucketPolicy, CandidateIndex, Origin};
use super::replace::{replace_with_hardlink, LinkOps, StdLinkOps};
use super::DedupError;
use crate::progress::ProgressCallback;
use crate::scanner::hasher::DEFAULT_BUFFER_SIZE;
use crate::scanner::{FileSource, Hasher, ScanError};

/// Engine behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Collision policy for the candidate index.
    pub bucket_policy: BucketPolicy,
    /// Abort on the first per-file error instead of recording it.
    pub strict: bool,
    /// Decide everything, mutate nothing.
    pub dry_run: bool,
    /// Read buffer size for hashing.
    pub hash_buffer_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bucket_policy: BucketPolicy::default(),
            strict: false,
            dry_run: false,
            hash_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl EngineConfig {
    /// Set the bucket policy.
    #[must_use]
    pub fn with_bucket_policy(mut self, policy: BucketPolicy) -> Self {
        self.bucket_policy = policy;
        self
    }

    /// Enable/disable strict mode.
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Enable/disable dry run.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Why a file was not considered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The path is a symbolic link
    Symlink,
    /// The path is not a regular file
    NotRegular,
}

/// Decision taken for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// New representative; nothing changed on disk.
    Registered,
    /// Reference file equivalent to an already indexed one; not added.
    AlreadyIndexed {
        /// The earlier equivalent file
        representative: PathBuf,
    },
    /// Replaced by a hardlink to `representative`.
    Linked {
        /// The file it now shares storage with
        representative: PathBuf,
        /// Bytes reclaimed
        bytes: u64,
    },
    /// Would have been linked, but the run is a dry run.
    WouldLink {
        /// The file it would share storage with
        representative: PathBuf,
        /// Bytes that would be reclaimed
        bytes: u64,
    },
    /// Already shares storage with `representative`.
    AlreadyLinked {
        /// The file it shares storage with
        representative: PathBuf,
    },
    /// Key collided but no representative matched.
    Distinct {
        /// Whether it became a new representative
        registered: bool,
    },
    /// Not a regular file.
    Skipped(SkipReason),
}

/// A file that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    /// The file (or directory) concerned
    pub path: PathBuf,
    /// What went wrong
    pub error: String,
}

/// Counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Files handed to the engine
    pub files_visited: usize,
    /// Files registered as representatives
    pub registered: usize,
    /// Files replaced by hardlinks
    pub linked: usize,
    /// Files a dry run would have replaced
    pub would_link: usize,
    /// Files already sharing storage with their representative
    pub already_linked: usize,
    /// Reference files equivalent to an earlier reference file
    pub already_indexed: usize,
    /// Key collisions without a content match
    pub distinct: usize,
    /// Entries that were not regular files
    pub skipped: usize,
    /// Bytes reclaimed (or reclaimable, in a dry run)
    pub bytes_reclaimed: u64,
    /// Per-file failures
    pub failures: Vec<FailureRecord>,
    /// Whether the run stopped early on a shutdown request
    pub interrupted: bool,
    /// Whether this was a dry run
    pub dry_run: bool,
}

impl RunSummary {
    /// Number of failed files.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    /// Whether any file failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    fn record(&mut self, outcome: &FileOutcome) {
        match outcome {
            FileOutcome::Registered => self.registered += 1,
            FileOutcome::AlreadyIndexed { .. } => self.already_indexed += 1,
            FileOutcome::AlreadyLinked { .. } => self.already_linked += 1,
            FileOutcome::Linked { bytes, .. } => {
                self.linked += 1;
                self.bytes_reclaimed += bytes;
            }
            FileOutcome::WouldLink { bytes, .. } => {
                self.would_link += 1;
                self.bytes_reclaimed += bytes;
            }
            FileOutcome::Distinct { registered } => {
                self.distinct += 1;
                if *registered {
                    self.registered += 1;
                }
            }
            FileOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

/// Which kind of tree is being walked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Index,
    Dedup,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Index => "index",
            Phase::Dedup => "dedup",
        }
    }
}

/// Everything the per-file decision touches. Kept apart from the file source
/// so a walk can borrow the source while decisions mutate the state.
struct EngineState<O> {
    index: CandidateIndex,
    hasher: Hasher,
    ops: O,
    config: EngineConfig,
    progress: Option<Arc<dyn ProgressCallback>>,
    summary: RunSummary,
}

/// Deduplicates files against a candidate index built during the run.
pub struct DedupEngine<S, O = StdLinkOps> {
    source: S,
    shutdown_flag: Option<Arc<AtomicBool>>,
    state: EngineState<O>,
}

impl<S: FileSource> DedupEngine<S, StdLinkOps> {
    /// Create an engine walking with `source` and mutating the real filesystem.
    #[must_use]
    pub fn new(source: S, config: EngineConfig) -> Self {
        let summary = RunSummary {
            dry_run: config.dry_run,
            ..RunSummary::default()
        };
        Self {
            source,
            shutdown_flag: None,
            state: EngineState {
                index: CandidateIndex::new(config.bucket_policy),
                hasher: Hasher::with_buffer_size(config.hash_buffer_size),
                ops: StdLinkOps,
                config,
                progress: None,
                summary,
            },
        }
    }
}

impl<S: FileSource, O: LinkOps> DedupEngine<S, O> {
    /// Replace the filesystem operations used for hardlink replacement.
    #[must_use]
    pub fn with_link_ops<P: LinkOps>(self, ops: P) -> DedupEngine<S, P> {
        let EngineState {
            index,
            hasher,
            config,
            progress,
            summary,
            ..
        } = self.state;
        DedupEngine {
            source: self.source,
            shutdown_flag: self.shutdown_flag,
            state: EngineState {
                index,
                hasher,
                ops,
                config,
                progress,
                summary,
            },
        }
    }

    /// Set the shutdown flag checked between files.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.state.progress = Some(callback);
        self
    }

    /// Counters accumulated so far.
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        &self.state.summary
    }

    /// Consume the engine and return its counters.
    #[must_use]
    pub fn into_summary(self) -> RunSummary {
        self.state.summary
    }

    /// The candidate index.
    #[must_use]
    pub fn index(&self) -> &CandidateIndex {
        &self.state.index
    }

    /// Register every regular file under each root as a candidate.
    ///
    /// Files under these roots are never modified.
    ///
    /// # Errors
    ///
    /// Returns an error if a root is missing or not a directory, or, in strict
    /// mode, on the first file that cannot be indexed.
    pub fn index_readonly(&mut self, roots: &[PathBuf]) -> Result<(), DedupError> {
        for root in roots {
            self.walk_root(root, Phase::Index)?;
            if self.state.summary.interrupted {
                break;
            }
        }
        Ok(())
    }

    /// Deduplicate every regular file under `root` against the index.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is missing or not a directory, or, in strict
    /// mode, on the first file that cannot be processed.
    pub fn dedup(&mut self, root: &Path) -> Result<(), DedupError> {
        self.walk_root(root, Phase::Dedup)
    }

    /// Decide on and possibly link one file of the target tree.
    ///
    /// # Errors
    ///
    /// Returns the per-file error; the index is left unchanged by it.
    pub fn process_file(&mut self, path: &Path) -> Result<FileOutcome, DedupError> {
        self.state.process_target(path)
    }

    /// Register one file of a reference tree.
    ///
    /// # Errors
    ///
    /// Returns the per-file error; the index is left unchanged by it.
    pub fn register_reference(&mut self, path: &Path) -> Result<FileOutcome, DedupError> {
        self.state.process_reference(path)
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    fn walk_root(&mut self, root: &Path, phase: Phase) -> Result<(), DedupError> {
        let metadata = fs::metadata(root).map_err(|e| ScanError::from_io(root, e))?;
        if !metadata.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()).into());
        }

        log::info!("Walking {} ({})", root.display(), phase.name());
        if let Some(progress) = &self.state.progress {
            progress.on_phase_start(phase.name(), root);
        }

        for entry in self.source.regular_files(root) {
            if self.is_shutdown_requested() {
                log::debug!("Engine: Shutdown requested, stopping");
                self.state.summary.interrupted = true;
                break;
            }

            let path = match entry {
                Ok(path) => path,
                Err(e) => {
                    let path = e.path().to_path_buf();
                    self.state.fail(&path, e.into())?;
                    continue;
                }
            };

            self.state.summary.files_visited += 1;
            let result = match phase {
                Phase::Index => self.state.process_reference(&path),
                Phase::Dedup => self.state.process_target(&path),
            };
            match result {
                Ok(outcome) => {
                    self.state.summary.record(&outcome);
                    if let Some(progress) = &self.state.progress {
                        progress.on_outcome(&path, &outcome);
                    }
                }
                Err(e) => self.state.fail(&path, e)?,
            }
        }

        // A walker sharing the flag stops yielding without an error; notice that too.
        if self.is_shutdown_requested() {
            self.state.summary.interrupted = true;
        }

        if let Some(progress) = &self.state.progress {
            progress.on_phase_end(phase.name());
        }
        Ok(())
    }
}

impl<O: LinkOps> EngineState<O> {
    /// Record a per-file failure, or return it in strict mode.
    fn fail(&mut self, path: &Path, error: DedupError) -> Result<(), DedupError> {
        let message = error.to_string();
        log::warn!("{}: {}", path.display(), message);
        if let Some(parked) = error.parked_file() {
            log::error!("Leftover parked file: {}", parked.display());
        }
        if let Some(progress) = &self.progress {
            progress.on_failure(path, &message);
        }
        self.summary.failures.push(FailureRecord {
            path: path.to_path_buf(),
            error: message,
        });

        if self.config.strict {
            Err(error)
        } else {
            Ok(())
        }
    }

    /// Descriptor for a visited path, or the reason it is skipped.
    fn inspect_regular(path: &Path) -> Result<Result<FileDescriptor, SkipReason>, DedupError> {
        let metadata = fs::symlink_metadata(path).map_err(|e| DedupError::metadata(path, e))?;
        if metadata.file_type().is_symlink() {
            log::trace!("Skipping symlink: {}", path.display());
            return Ok(Err(SkipReason::Symlink));
        }
        if !metadata.is_file() {
            return Ok(Err(SkipReason::NotRegular));
        }
        FileDescriptor::inspect(path).map(Ok)
    }

    /// Compare `descriptor` against each representative of its bucket in
    /// registration order, returning the first match.
    ///
    /// Every representative is inspected and, if needed, hashed afresh. A
    /// representative that cannot be inspected or read is skipped.
    fn find_match(
        &self,
        descriptor: &mut FileDescriptor,
    ) -> Result<Option<(PathBuf, Equivalence)>, DedupError> {
        let key = *descriptor.key();

        for rep in self.index.representatives(&key) {
            let mut candidate = match FileDescriptor::inspect(&rep.path) {
                Ok(candidate) => candidate,
                Err(e) => {
                    log::warn!("Representative unavailable, skipping it: {}", e);
                    continue;
                }
            };

            let verdict = match compare(descriptor, &mut candidate, &self.hasher) {
                Ok(verdict) => verdict,
                // The visited file is hashed first; a later failure is the representative's.
                Err(e) if descriptor.cached_digest().is_some() => {
                    log::warn!("Representative unreadable, skipping it: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if verdict.is_equivalent() {
                return Ok(Some((rep.path.clone(), verdict)));
            }
            log::trace!(
                "{} differs from {} ({:?})",
                descriptor.path().display(),
                rep.path.display(),
                verdict
            );
        }
        Ok(None)
    }

    fn process_reference(&mut self, path: &Path) -> Result<FileOutcome, DedupError> {
        let mut descriptor = match Self::inspect_regular(path)? {
            Ok(descriptor) => descriptor,
            Err(reason) => return Ok(FileOutcome::Skipped(reason)),
        };
        let key = *descriptor.key();

        if self.index.representatives(&key).is_empty() {
            self.index.register(key, path, Origin::Reference);
            return Ok(FileOutcome::Registered);
        }

        match self.find_match(&mut descriptor)? {
            Some((representative, _)) => Ok(FileOutcome::AlreadyIndexed { representative }),
            None => {
                let registered = self.index.register(key, path, Origin::Reference);
                Ok(FileOutcome::Distinct { registered })
            }
        }
    }

    fn process_target(&mut self, path: &Path) -> Result<FileOutcome, DedupError> {
        let mut descriptor = match Self::inspect_regular(path)? {
            Ok(descriptor) => descriptor,
            Err(reason) => return Ok(FileOutcome::Skipped(reason)),
        };
        let key = *descriptor.key();

        if self.index.representatives(&key).is_empty() {
            self.index.register(key, path, Origin::Target);
            return Ok(FileOutcome::Registered);
        }

        let Some((representative, verdict)) = self.find_match(&mut descriptor)? else {
            let registered = self.index.register(key, path, Origin::Target);
            return Ok(FileOutcome::Distinct { registered });
        };

        if verdict == Equivalence::SameFile {
            log::debug!(
                "{} already shares storage with {}",
                path.display(),
                representative.display()
            );
            return Ok(FileOutcome::AlreadyLinked { representative });
        }

        let bytes = descriptor.size();
        if self.config.dry_run {
            log::info!(
                "Would replace {} with hardlink to {}",
                path.display(),
                representative.display()
            );
            return Ok(FileOutcome::WouldLink {
                representative,
                bytes,
            });
        }

        log::info!(
            "Replacing {} with hardlink to {}",
            path.display(),
            representative.display()
        );
        replace_with_hardlink(&self.ops, path, &representative)?;
        Ok(FileOutcome::Linked {
            representative,
            bytes,
        })
    }
}

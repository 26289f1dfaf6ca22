//! Crash-tolerant replacement of a duplicate by a hardlink.
//!
//! # Procedure
//!
//! 1. Pick an unused sibling name `<name>.<random>.aside` next to the duplicate.
//! 2. Rename ("park") the duplicate to that name.
//! 3. Hardlink the representative at the duplicate's original path.
//!    - success: remove the parked file;
//!    - failure: rename the parked file back, then report the link error.
//!
//! From step 2 until step 3 finishes, the original bytes are always reachable
//! at either the original path or the parked path. A crash in between leaves
//! the parked file for [`super::recover`] to reconcile.
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::dedup::replace::{replace_with_hardlink, StdLinkOps};
//! use std::path::Path;
//!
//! replace_with_hardlink(&StdLinkOps, Path::new("copy.bin"), Path::new("original.bin")).unwrap();
//! ```

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::DedupError;

/// Extension marking a parked file.
pub const PARKED_EXTENSION: &str = "aside";

/// Attempts at finding an unused parking name before giving up.
const MAX_PARKING_ATTEMPTS: usize = 16;

/// Filesystem operations used by the replacement procedure.
pub trait LinkOps {
    /// Whether a directory entry exists at `path` (symlinks are not followed).
    fn entry_exists(&self, path: &Path) -> io::Result<bool>;

    /// Rename `from` to `to` on the same filesystem.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Create `link` as a hardlink to `original`.
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;

    /// Remove the file at `path`.
    fn remove_file(&self, path: &Path) -> io::Result<()>;
}

/// [`LinkOps`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdLinkOps;

impl LinkOps for StdLinkOps {
    fn entry_exists(&self, path: &Path) -> io::Result<bool> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(original, link)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// Sibling parking path for `path` with the given suffix.
///
/// Returns `None` if `path` has no file name.
#[must_use]
pub fn parked_path(path: &Path, suffix: u32) -> Option<PathBuf> {
    let name = path.file_name()?;
    let mut parked = OsString::from(name);
    parked.push(format!(".{suffix}.{PARKED_EXTENSION}"));
    Some(path.with_file_name(parked))
}

/// Whether `name` looks like `<name>.<digits>.aside`.
#[must_use]
pub fn is_parked_name(name: &OsStr) -> bool {
    parked_original_name(name).is_some()
}

/// Original file name of a parked file name, if it is one.
#[must_use]
pub fn parked_original_name(name: &OsStr) -> Option<&str> {
    let name = name.to_str()?;
    let stem = name.strip_suffix(PARKED_EXTENSION)?.strip_suffix('.')?;
    let (original, suffix) = stem.rsplit_once('.')?;
    if original.is_empty() || suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(original)
}

/// Original path of a parked file, if `parked` is one.
#[must_use]
pub fn parked_original(parked: &Path) -> Option<PathBuf> {
    let original = parked_original_name(parked.file_name()?)?;
    Some(parked.with_file_name(original))
}

/// Choose an unused parking path next to `path`.
fn choose_parking<O: LinkOps + ?Sized>(ops: &O, path: &Path) -> Result<PathBuf, DedupError> {
    for _ in 0..MAX_PARKING_ATTEMPTS {
        let candidate = parked_path(path, rand::random::<u32>())
            .ok_or_else(|| DedupError::NoParkingName(path.to_path_buf()))?;
        match ops.entry_exists(&candidate) {
            Ok(false) => return Ok(candidate),
            Ok(true) => log::trace!("Parking name taken: {}", candidate.display()),
            Err(e) => return Err(DedupError::metadata(&candidate, e)),
        }
    }
    Err(DedupError::NoParkingName(path.to_path_buf()))
}

/// Replace `duplicate` by a hardlink to `representative`.
///
/// The caller must already have established that both files are equivalent.
///
/// # Errors
///
/// - [`DedupError::Park`]: the duplicate could not be moved aside; untouched.
/// - [`DedupError::Link`]: the link failed; the duplicate was restored.
/// - [`DedupError::Restore`]: the link failed and the duplicate is stranded
///   at its parking path.
/// - [`DedupError::Cleanup`]: the link succeeded but the parked copy remains.
pub fn replace_with_hardlink<O: LinkOps + ?Sized>(
    ops: &O,
    duplicate: &Path,
    representative: &Path,
) -> Result<(), DedupError> {
    let temp = choose_parking(ops, duplicate)?;

    ops.rename(duplicate, &temp).map_err(|source| DedupError::Park {
        path: duplicate.to_path_buf(),
        temp: temp.clone(),
        source,
    })?;

    if let Err(link_error) = ops.hard_link(representative, duplicate) {
        log::debug!(
            "Link {} -> {} failed, restoring: {}",
            duplicate.display(),
            representative.display(),
            link_error
        );
        return match ops.rename(&temp, duplicate) {
            Ok(()) => Err(DedupError::Link {
                path: duplicate.to_path_buf(),
                target: representative.to_path_buf(),
                source: link_error,
            }),
            Err(source) => {
                log::error!(
                    "Content of {} is parked at {}",
                    duplicate.display(),
                    temp.display()
                );
                Err(DedupError::Restore {
                    path: duplicate.to_path_buf(),
                    temp,
                    link_error,
                    source,
                })
            }
        };
    }

    ops.remove_file(&temp).map_err(|source| DedupError::Cleanup {
        path: duplicate.to_path_buf(),
        temp: temp.clone(),
        source,
    })
}

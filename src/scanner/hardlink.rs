//! Same-file identity for hardlink-aware comparison.
//!
//! # Overview
//!
//! Hardlinks are multiple directory entries pointing to the same inode on disk.
//! Two paths that resolve to the same inode already share storage, so they are
//! trivially equivalent and never need their content read.
//!
//! # Platform Support
//!
//! - **Unix**: Uses (device_id, inode) pairs from file metadata
//! - **Other**: Falls back to comparing canonicalized paths, which catches
//!   self-comparison and symlink aliases but not hardlink aliases. Those
//!   are still recognised as equivalent by digest.
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::scanner::hardlink::is_same_file;
//! use std::path::Path;
//!
//! if is_same_file(Path::new("a.txt"), Path::new("b.txt")).unwrap() {
//!     println!("already linked");
//! }
//! ```

use std::fs::{self, Metadata};
use std::io;
#[cfg(not(unix))]
use std::path::PathBuf;
use std::path::Path;

/// Identity of the storage object a path resolves to.
///
/// On Unix, this is (device_id, inode).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    #[cfg(unix)]
    dev: u64,
    #[cfg(unix)]
    ino: u64,
    #[cfg(not(unix))]
    canonical: PathBuf,
}

impl FileIdentity {
    /// Resolve the identity of `path`, following symbolic links.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the path cannot be resolved.
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Self::from_metadata(path, &metadata)
    }

    /// Build an identity from already-fetched metadata.
    #[cfg(unix)]
    pub fn from_metadata(_path: &Path, metadata: &Metadata) -> io::Result<Self> {
        use std::os::unix::fs::MetadataExt;
        Ok(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    /// Build an identity from already-fetched metadata.
    #[cfg(not(unix))]
    pub fn from_metadata(path: &Path, _metadata: &Metadata) -> io::Result<Self> {
        Ok(Self {
            canonical: fs::canonicalize(path)?,
        })
    }
}

/// Check whether `a` and `b` resolve to the same underlying file.
///
/// # Errors
///
/// Returns an I/O error if either path cannot be resolved.
pub fn is_same_file(a: &Path, b: &Path) -> io::Result<bool> {
    Ok(FileIdentity::of(a)? == FileIdentity::of(b)?)
}

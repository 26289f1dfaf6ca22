//! File descriptors and the equivalence model.
//!
//! # Overview
//!
//! A [`FileDescriptor`] captures the cheap, content-independent attributes of a
//! file (its [`EquivalenceKey`]) plus an optional SHA-1 digest that is only
//! computed when a comparison actually needs it.
//!
//! Comparison is staged from cheapest to most expensive:
//!
//! 1. Every attribute of the key must match, or the files are different.
//! 2. Paths resolving to the same underlying file are equivalent as-is.
//! 3. Otherwise the digests decide. Each descriptor hashes its file at most once.
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::dedup::descriptor::{compare, FileDescriptor};
//! use linkdupe::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let mut a = FileDescriptor::inspect(Path::new("a.bin")).unwrap();
//! let mut b = FileDescriptor::inspect(Path::new("b.bin")).unwrap();
//! let verdict = compare(&mut a, &mut b, &hasher).unwrap();
//! println!("equivalent: {}", verdict.is_equivalent());
//! ```

use std::fmt;
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};

use serde::Serialize;

use super::DedupError;
use crate::scanner::{digest_to_hex, Digest, FileIdentity, HashError, Hasher};

/// Cheap attributes two files must share before their content is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EquivalenceKey {
    /// File size in bytes
    pub size: u64,
    /// Readable by the current user
    pub readable: bool,
    /// Writable by the current user
    pub writable: bool,
    /// Executable by the current user
    pub executable: bool,
    /// Hidden file
    pub hidden: bool,
    /// POSIX permission bits (`0o777` mask), `0` without POSIX permissions
    pub permission_bits: u32,
}

impl EquivalenceKey {
    /// Permission bits in octal notation, `0` when absent.
    #[must_use]
    pub fn mode_string(&self) -> String {
        if self.permission_bits == 0 {
            "0".to_string()
        } else {
            format!("0{:o}", self.permission_bits)
        }
    }
}

impl fmt::Display for EquivalenceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "size={} readable={} writable={} executable={} hidden={} mode={}",
            self.size,
            self.readable,
            self.writable,
            self.executable,
            self.hidden,
            self.mode_string()
        )
    }
}

/// Per-visit view of a file used to answer "is this a duplicate".
#[derive(Debug, Clone)]
pub struct FileDescriptor {
    path: PathBuf,
    key: EquivalenceKey,
    identity: FileIdentity,
    digest: Option<Digest>,
}

impl FileDescriptor {
    /// Read the metadata of `path` and build its descriptor.
    ///
    /// Symbolic links are followed. No content is read.
    ///
    /// # Errors
    ///
    /// Returns [`DedupError::Metadata`] if the metadata cannot be read.
    pub fn inspect(path: &Path) -> Result<Self, DedupError> {
        let metadata = fs::metadata(path).map_err(|e| DedupError::metadata(path, e))?;
        let identity =
            FileIdentity::from_metadata(path, &metadata).map_err(|e| DedupError::metadata(path, e))?;
        let (readable, writable, executable) = access_flags(path, &metadata);

        let key = EquivalenceKey {
            size: metadata.len(),
            readable,
            writable,
            executable,
            hidden: is_hidden(path, &metadata),
            permission_bits: permission_bits(&metadata),
        };
        log::debug!("{}: {}", path.display(), key);

        Ok(Self {
            path: path.to_path_buf(),
            key,
            identity,
            digest: None,
        })
    }

    /// Path this descriptor was built from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cheap-attribute key.
    #[must_use]
    pub fn key(&self) -> &EquivalenceKey {
        &self.key
    }

    /// File size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.key.size
    }

    /// Underlying file identity.
    #[must_use]
    pub fn identity(&self) -> &FileIdentity {
        &self.identity
    }

    /// The content digest, computed on first call and reused afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be read in full.
    pub fn digest(&mut self, hasher: &Hasher) -> Result<Digest, HashError> {
        let digest = match self.digest {
            Some(digest) => digest,
            None => {
                log::trace!("Hashing {}", self.path.display());
                hasher.full_hash(&self.path)?
            }
        };
        Ok(*self.digest.insert(digest))
    }

    /// The digest if it has already been computed.
    #[must_use]
    pub fn cached_digest(&self) -> Option<&Digest> {
        self.digest.as_ref()
    }
}

/// Outcome of comparing two descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Equivalence {
    /// At least one cheap attribute differs; no content was read.
    AttributesDiffer,
    /// Both paths resolve to the same underlying file; no content was read.
    SameFile,
    /// Distinct files with equal digests.
    SameContent,
    /// Distinct files with different digests.
    ContentDiffers,
}

impl Equivalence {
    /// Whether one file may be replaced by a hardlink to the other.
    #[must_use]
    pub fn is_equivalent(self) -> bool {
        matches!(self, Self::SameFile | Self::SameContent)
    }
}

/// Decide whether `a` and `b` are equivalent.
///
/// Digests are computed lazily and stay memoized on the descriptors.
///
/// # Errors
///
/// Returns [`DedupError::Hash`] if a digest is needed and a file cannot be read.
pub fn compare(
    a: &mut FileDescriptor,
    b: &mut FileDescriptor,
    hasher: &Hasher,
) -> Result<Equivalence, DedupError> {
    if a.key != b.key {
        return Ok(Equivalence::AttributesDiffer);
    }

    if a.identity == b.identity {
        return Ok(Equivalence::SameFile);
    }

    let left = a.digest(hasher)?;
    let right = b.digest(hasher)?;
    if left == right {
        Ok(Equivalence::SameContent)
    } else {
        Ok(Equivalence::ContentDiffers)
    }
}

/// One side of a [`Comparison`].
#[derive(Debug, Clone, Serialize)]
pub struct DescriptorReport {
    /// Path of the file
    pub path: PathBuf,
    /// Cheap attributes
    pub key: EquivalenceKey,
    /// Hex digest, present only if the comparison needed it
    pub digest: Option<String>,
}

impl From<&FileDescriptor> for DescriptorReport {
    fn from(descriptor: &FileDescriptor) -> Self {
        Self {
            path: descriptor.path.clone(),
            key: descriptor.key,
            digest: descriptor.digest.as_ref().map(digest_to_hex),
        }
    }
}

/// Full report of comparing two paths.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    /// First file
    pub left: DescriptorReport,
    /// Second file
    pub right: DescriptorReport,
    /// The verdict
    pub verdict: Equivalence,
    /// Whether `right` could replace `left` by a hardlink
    pub equivalent: bool,
}

/// Inspect two paths and compare them.
///
/// # Errors
///
/// Returns [`DedupError`] if either file's metadata or content cannot be read.
pub fn compare_paths(a: &Path, b: &Path, hasher: &Hasher) -> Result<Comparison, DedupError> {
    let mut left = FileDescriptor::inspect(a)?;
    let mut right = FileDescriptor::inspect(b)?;
    let verdict = compare(&mut left, &mut right, hasher)?;

    Ok(Comparison {
        left: DescriptorReport::from(&left),
        right: DescriptorReport::from(&right),
        verdict,
        equivalent: verdict.is_equivalent(),
    })
}

#[cfg(unix)]
fn access_flags(path: &Path, _metadata: &Metadata) -> (bool, bool, bool) {
    use nix::unistd::{access, AccessFlags};

    let allowed = |mode: AccessFlags| access(path, mode).is_ok();
    (
        allowed(AccessFlags::R_OK),
        allowed(AccessFlags::W_OK),
        allowed(AccessFlags::X_OK),
    )
}

#[cfg(not(unix))]
fn access_flags(_path: &Path, metadata: &Metadata) -> (bool, bool, bool) {
    (true, !metadata.permissions().readonly(), true)
}

#[cfg(unix)]
fn permission_bits(metadata: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn permission_bits(_metadata: &Metadata) -> u32 {
    0
}

#[cfg(windows)]
fn is_hidden(_path: &Path, metadata: &Metadata) -> bool {
    use std::os::windows::fs::MetadataExt;
    const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
    metadata.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0
}

#[cfg(not(windows))]
fn is_hidden(path: &Path, _metadata: &Metadata) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

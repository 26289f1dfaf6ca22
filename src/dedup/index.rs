//! Candidate index: equivalence key to representative files.
//!
//! Files are bucketed by their [`EquivalenceKey`]. A bucket hit only means the
//! cheap attributes collided; the engine still has to prove full equivalence
//! against a representative before linking.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::descriptor::EquivalenceKey;

/// What happens to a file whose key collides with a bucket but whose content
/// matches none of its representatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BucketPolicy {
    /// One representative per key; non-matching files stay unregistered.
    Single,
    /// Every distinct content under a key gets its own representative.
    #[default]
    Multi,
}

impl std::fmt::Display for BucketPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BucketPolicy::Single => write!(f, "single"),
            BucketPolicy::Multi => write!(f, "multi"),
        }
    }
}

/// Where a representative was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// A read-only reference directory
    Reference,
    /// The target directory being deduplicated
    Target,
}

/// A file other files may be linked to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representative {
    /// Path of the file
    pub path: PathBuf,
    /// Directory kind it came from
    pub origin: Origin,
}

/// Mapping from equivalence key to representatives, owned by one engine run.
#[derive(Debug, Default)]
pub struct CandidateIndex {
    buckets: HashMap<EquivalenceKey, Vec<Representative>>,
    policy: BucketPolicy,
}

impl CandidateIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new(policy: BucketPolicy) -> Self {
        Self {
            buckets: HashMap::new(),
            policy,
        }
    }

    /// The collision policy in effect.
    #[must_use]
    pub fn policy(&self) -> BucketPolicy {
        self.policy
    }

    /// Representatives registered under `key`, in registration order.
    #[must_use]
    pub fn representatives(&self, key: &EquivalenceKey) -> &[Representative] {
        self.buckets.get(key).map_or(&[], Vec::as_slice)
    }

    /// Register `path` under `key`.
    ///
    /// Under [`BucketPolicy::Single`] an occupied bucket is left as-is.
    /// Returns whether the path was registered.
    pub fn register(&mut self, key: EquivalenceKey, path: &Path, origin: Origin) -> bool {
        let bucket = self.buckets.entry(key).or_default();
        if !bucket.is_empty() && self.policy == BucketPolicy::Single {
            return false;
        }
        bucket.push(Representative {
            path: path.to_path_buf(),
            origin,
        });
        true
    }

    /// Number of distinct keys.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Total number of representatives.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Whether no file is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }
}

//! Layered configuration.
//!
//! Values are merged, lowest priority first, from:
//!
//! 1. built-in defaults,
//! 2. a TOML file (`--config PATH`, else `<config_dir>/linkdupe/config.toml`),
//! 3. `LINKDUPE_*` environment variables,
//! 4. command-line flags (see [`crate::cli::DedupArgs::apply`]).
//!
//! ```toml
//! bucket_policy = "multi"
//! strict = false
//! min_size = 4096
//! ignore_patterns = ["*.tmp", ".git/"]
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::dedup::{BucketPolicy, EngineConfig};
use crate::scanner::hasher::DEFAULT_BUFFER_SIZE;
use crate::scanner::WalkerConfig;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "LINKDUPE_";

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    /// A source could not be parsed or holds invalid values.
    #[error("invalid configuration: {0}")]
    Invalid(#[from] figment::Error),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Handling of key collisions without a content match
    pub bucket_policy: BucketPolicy,
    /// Abort on the first per-file error
    pub strict: bool,
    /// Decide everything, change nothing
    pub dry_run: bool,
    /// Skip files smaller than this many bytes
    pub min_size: Option<u64>,
    /// Gitignore-style patterns to skip
    pub ignore_patterns: Vec<String>,
    /// Read buffer size for hashing, in bytes
    pub hash_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bucket_policy: BucketPolicy::default(),
            strict: false,
            dry_run: false,
            min_size: None,
            ignore_patterns: Vec::new(),
            hash_buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl Config {
    /// Platform-specific default configuration path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "linkdupe", "linkdupe").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Merged configuration sources, without the command line.
    ///
    /// A missing default file is skipped silently.
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = path.map(Path::to_path_buf).or_else(Self::default_path) {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Load the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` is given but does not exist,
    /// and [`ConfigError::Invalid`] if any source cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
        }
        let config: Config = Self::figment(path).extract()?;
        log::debug!("Configuration: {:?}", config);
        Ok(config)
    }

    /// Engine settings.
    #[must_use]
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            bucket_policy: self.bucket_policy,
            strict: self.strict,
            dry_run: self.dry_run,
            hash_buffer_size: self.hash_buffer_size,
        }
    }

    /// Walk filters.
    #[must_use]
    pub fn walker_config(&self) -> WalkerConfig {
        WalkerConfig::default()
            .with_min_size(self.min_size)
            .with_ignore_patterns(self.ignore_patterns.clone())
    }
}

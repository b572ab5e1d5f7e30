//! Cache engine configuration: cache root, default mode, and the two
//! stored-but-unenforced knobs (`max_cache_size_bytes`, `compress_messages`).
//! Loaded from TOML via the `config` crate. This is distinct from (and much
//! smaller than) the interactive client's own account/credential config,
//! which remains an external collaborator (§6).

use crate::error::{MailCacheError, Result};
use crate::mode::Mode;
use serde::Deserialize;
use std::path::{Path, PathBuf};

fn default_mode_str() -> String {
    "ONLINE".to_string()
}

/// Cache engine configuration, one per process (or per account, if the
/// embedding application chooses to vary it).
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory under which every store's folder tree is rooted.
    pub cache_root: PathBuf,

    /// Mode a freshly opened store starts in, absent an explicit override.
    #[serde(default = "default_mode_str")]
    pub default_mode: String,

    /// Soft byte cap on total cache size. Stored for inspection by an
    /// embedding application; never enforced by append or synchronize.
    #[serde(default)]
    pub max_cache_size_bytes: Option<u64>,

    /// Whether bodies/attachments should be compressed at rest. Stored only;
    /// has no observable effect on any read or write path.
    #[serde(default)]
    pub compress_messages: bool,
}

impl Config {
    /// Build a config directly, bypassing file/env loading. Handy for tests
    /// and for embedders that already have these values in hand.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            default_mode: default_mode_str(),
            max_cache_size_bytes: None,
            compress_messages: false,
        }
    }

    /// Load configuration from a TOML file at `path`, falling back to
    /// environment variables prefixed `MAILCACHE_` for any field the file
    /// omits (e.g. `MAILCACHE_CACHE_ROOT`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let builder = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(config::Environment::with_prefix("MAILCACHE"));
        let built = builder
            .build()
            .map_err(|e| MailCacheError::InvalidState(format!("failed to load config {path:?}: {e}")))?;
        built
            .try_deserialize()
            .map_err(|e| MailCacheError::InvalidState(format!("invalid config {path:?}: {e}")))
    }

    /// Parse the configured `default_mode` string into a [`Mode`]. Unknown
    /// values fall back to `Online`, the spec's least surprising default.
    pub fn default_mode(&self) -> Mode {
        match self.default_mode.to_ascii_uppercase().as_str() {
            "OFFLINE" => Mode::Offline,
            "ACCELERATED" => Mode::Accelerated,
            "REFRESH" => Mode::Refresh,
            "DESTRUCTIVE" => Mode::Destructive,
            _ => Mode::Online,
        }
    }
}

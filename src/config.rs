//! Context configuration.
//!
//! [`AioConfig`] is plain data with serde defaults, so a partial TOML table
//! (with the `config-file` feature) fills in whatever it leaves out:
//!
//! ```toml
//! events_capacity = 256
//! eager_default_loop = true
//! legacy_dispatch = false
//! ```

use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
#[cfg(feature = "config-file")]
use std::path::Path;
use thiserror::Error;

const DEFAULT_EVENTS_CAPACITY: NonZeroUsize = match NonZeroUsize::new(1024) {
    Some(n) => n,
    None => unreachable!(),
};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    /// The config text is not valid.
    #[cfg(feature = "config-file")]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for an [`AioContext`](crate::AioContext).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AioConfig {
    /// Events polled per loop turn on native loops.
    pub events_capacity: NonZeroUsize,
    /// Create the default loop when the context is built rather than on
    /// first use.
    pub eager_default_loop: bool,
    /// Route `init` on the `aio` base (and on kinds without an initializer)
    /// through the deprecated dispatch facade. When off, the facade rejects
    /// every kind.
    pub legacy_dispatch: bool,
}

impl Default for AioConfig {
    fn default() -> Self {
        Self {
            events_capacity: DEFAULT_EVENTS_CAPACITY,
            eager_default_loop: false,
            legacy_dispatch: true,
        }
    }
}

impl AioConfig {
    /// Sets the per-turn event capacity.
    #[must_use]
    pub const fn with_events_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.events_capacity = capacity;
        self
    }

    /// Sets whether the default loop is created eagerly.
    #[must_use]
    pub const fn with_eager_default_loop(mut self, eager: bool) -> Self {
        self.eager_default_loop = eager;
        self
    }

    /// Sets whether the deprecated dispatch facade forwards anything.
    #[must_use]
    pub const fn with_legacy_dispatch(mut self, enabled: bool) -> Self {
        self.legacy_dispatch = enabled;
        self
    }

    /// Parses a TOML document. Missing keys take their defaults.
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

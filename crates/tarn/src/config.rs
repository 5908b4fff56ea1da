//! Startup configuration for a [`Core`](crate::core::Core).
//!
//! Plain data with per-field serde defaults, so a config file only needs the
//! keys it changes:
//!
//! ```json
//! {
//!   "watch": [ { "name": "player", "path": "assets/player.png" } ],
//!   "flush_events_on_update": false
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}

/// An asset to watch from startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Start the file watcher. Ignored without the `hot-reload` feature.
    pub hot_reload: bool,
    pub watch: Vec<WatchEntry>,
    /// Fail startup if a bridge type lacks a required operation.
    pub strict_bridge: bool,
    /// Deliver every queued event at the end of [`Core::update`](crate::core::Core::update).
    pub flush_events_on_update: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            hot_reload: cfg!(feature = "hot-reload"),
            watch: Vec::new(),
            strict_bridge: true,
            flush_events_on_update: true,
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn watching(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.watch.push(WatchEntry {
            name: name.into(),
            path: path.into(),
        });
        self
    }
}

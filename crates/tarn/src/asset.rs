//! # Asset Hot-Reload
//!
//! Watches files on disk and tells the game when one of them changed, so a
//! texture or a script can be swapped in without restarting.
//!
//! ## How It Works
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  AssetWatcher (context entry in the Registry)            │
//! │                                                          │
//! │  watcher ──► notify thread                               │
//! │              read lock: is this path one of ours?        │
//! │              write lock: flip `dirty`, stamp the time    │
//! │                                                          │
//! │  assets: Arc<RwLock<Vec<WatchedAsset>>>                  │
//! └──────────────────────────────────────────────────────────┘
//!
//! Per-frame: process_asset_reloads(registry, events)
//!   1. drain_dirty(): one write lock, take every quiet dirty entry
//!   2. enqueue AssetReloaded { name, path } for each
//! ```
//!
//! ## Debounce
//!
//! Editors often save atomically (write temp file, rename over the
//! original), which fires several events in a burst. Each event only resets
//! the entry's timestamp; an entry is drained once it has been quiet for the
//! debounce window, so one burst of saves yields exactly one reload.
//!
//! ## Graceful Degradation
//!
//! If the filesystem watcher fails to start (e.g. inotify limit reached),
//! the `AssetWatcher` still works: [`mark_dirty`](AssetWatcher::mark_dirty)
//! can flag assets by hand, they just won't be noticed automatically.
//! Errors are logged, not panicked.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::ecs::Registry;
use crate::event::{AssetReloaded, EventDispatcher};

/// Events within this window of each other collapse into one reload.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("cannot watch '{path}': {source}")]
    Missing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file watcher rejected '{path}': {source}")]
    Watch {
        path: PathBuf,
        source: notify::Error,
    },
}

/// One watched file.
#[derive(Debug, Clone)]
pub struct WatchedAsset {
    pub name: String,
    /// Canonical path, matched against watcher events.
    pub path: PathBuf,
    dirty: bool,
    last_event: Option<Instant>,
}

impl WatchedAsset {
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

type SharedAssets = Arc<RwLock<Vec<WatchedAsset>>>;

/// Shared dirty-flag table between the notify thread and the main thread.
pub struct AssetWatcher {
    /// `None` if initialization failed.
    watcher: Option<RecommendedWatcher>,
    assets: SharedAssets,
    debounce: Duration,
}

/// Flag the entry for `path`, if any. Scans under the read lock and only
/// takes the write lock when there is something to flip.
fn flag(assets: &SharedAssets, path: &Path) -> bool {
    let index = {
        let guard = assets.read().unwrap_or_else(PoisonError::into_inner);
        guard.iter().position(|asset| asset.path == path)
    };
    let Some(index) = index else {
        return false;
    };

    let mut guard = assets.write().unwrap_or_else(PoisonError::into_inner);
    match guard.get_mut(index) {
        // Entry order never changes, but re-check the path under the write lock.
        Some(asset) if asset.path == path => {
            asset.dirty = true;
            asset.last_event = Some(Instant::now());
            true
        }
        _ => false,
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

impl AssetWatcher {
    /// Create the watcher and start its background thread.
    pub fn new() -> Self {
        let assets: SharedAssets = Arc::default();
        let shared = Arc::clone(&assets);

        let watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| match res {
            Ok(event) => {
                // Atomic saves show up as create.
                if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
                    for path in &event.paths {
                        if flag(&shared, &canonical(path)) {
                            log::debug!("asset changed: {}", path.display());
                        }
                    }
                }
            }
            Err(e) => log::warn!("File watcher error: {e}"),
        });

        let watcher = match watcher {
            Ok(w) => Some(w),
            Err(e) => {
                log::warn!("Failed to create file watcher: {e}. Hot-reload disabled.");
                None
            }
        };

        Self {
            watcher,
            assets,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Whether the background watcher is running.
    pub fn is_active(&self) -> bool {
        self.watcher.is_some()
    }

    /// Start watching `path` under `name`. The file must exist.
    pub fn watch(&mut self, name: impl Into<String>, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let path = path.as_ref();
        let canonical = path.canonicalize().map_err(|source| AssetError::Missing {
            path: path.to_path_buf(),
            source,
        })?;

        if let Some(watcher) = &mut self.watcher {
            watcher
                .watch(&canonical, RecursiveMode::NonRecursive)
                .map_err(|source| AssetError::Watch {
                    path: canonical.clone(),
                    source,
                })?;
        }

        let name = name.into();
        log::info!("watching asset '{name}': {}", canonical.display());
        self.assets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(WatchedAsset {
                name,
                path: canonical,
                dirty: false,
                last_event: None,
            });
        Ok(())
    }

    /// Flag an asset as changed by hand. Returns `false` if `path` is not watched.
    pub fn mark_dirty(&self, path: impl AsRef<Path>) -> bool {
        flag(&self.assets, &canonical(path.as_ref()))
    }

    /// Snapshot of the watch table.
    pub fn watched(&self) -> Vec<WatchedAsset> {
        self.assets.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of dirty entries, quiet or not.
    pub fn pending(&self) -> usize {
        self.assets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|asset| asset.dirty)
            .count()
    }

    /// Take every dirty entry that has been quiet for the debounce window,
    /// clearing its flag. One write lock for the whole pass.
    pub fn drain_dirty(&self) -> Vec<(String, PathBuf)> {
        let now = Instant::now();
        let mut guard = self.assets.write().unwrap_or_else(PoisonError::into_inner);
        guard
            .iter_mut()
            .filter(|asset| {
                asset.dirty
                    && asset
                        .last_event
                        .is_none_or(|at| now.duration_since(at) >= self.debounce)
            })
            .map(|asset| {
                asset.dirty = false;
                (asset.name.clone(), asset.path.clone())
            })
            .collect()
    }
}

impl Default for AssetWatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain the registry's [`AssetWatcher`] (if any) and enqueue one
/// [`AssetReloaded`] per changed asset. Called once per frame.
pub fn process_asset_reloads(registry: &Registry, events: &mut EventDispatcher) -> usize {
    let Some(watcher) = registry.try_get_context::<AssetWatcher>() else {
        return 0;
    };

    let ready = watcher.drain_dirty();
    for (name, path) in &ready {
        log::info!("Hot-reloaded asset '{name}': {}", path.display());
        events.enqueue(AssetReloaded {
            name: name.clone(),
            path: path.display().to_string(),
        });
    }
    ready.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn temp_file(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("tarn_asset_{tag}_{}.txt", std::process::id()));
        std::fs::write(&path, "v1").unwrap();
        path
    }

    #[test]
    fn watch_requires_existing_file() {
        let mut watcher = AssetWatcher::new();
        let err = watcher.watch("ghost", "/definitely/not/here.png").unwrap_err();
        assert!(matches!(err, AssetError::Missing { .. }));
        assert!(watcher.watched().is_empty());
    }

    #[test]
    fn mark_and_drain() {
        let path = temp_file("drain");
        let mut watcher = AssetWatcher::new().with_debounce(Duration::ZERO);
        watcher.watch("player", &path).unwrap();

        assert!(watcher.drain_dirty().is_empty());
        assert!(watcher.mark_dirty(&path));
        assert!(watcher.mark_dirty(&path));
        assert_eq!(watcher.pending(), 1);

        let drained = watcher.drain_dirty();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, "player");
        assert!(watcher.drain_dirty().is_empty());
        assert!(!watcher.mark_dirty("/not/watched"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn debounce_holds_recent_changes() {
        let path = temp_file("debounce");
        let mut watcher = AssetWatcher::new().with_debounce(Duration::from_secs(3600));
        watcher.watch("slow", &path).unwrap();

        watcher.mark_dirty(&path);
        assert!(watcher.drain_dirty().is_empty());
        assert_eq!(watcher.pending(), 1);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reloads_become_queued_events() {
        let path = temp_file("events");
        let mut registry = Registry::new();
        let mut watcher = AssetWatcher::new().with_debounce(Duration::ZERO);
        watcher.watch("tiles", &path).unwrap();
        registry.add_context(watcher).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut events = EventDispatcher::new();
        events.subscribe(move |e: &AssetReloaded| sink.borrow_mut().push(e.name.clone()));

        registry.get_context::<AssetWatcher>().mark_dirty(&path);
        assert_eq!(process_asset_reloads(&registry, &mut events), 1);
        assert!(seen.borrow().is_empty());
        events.flush_all();
        assert_eq!(*seen.borrow(), vec!["tiles"]);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn no_watcher_no_events() {
        let registry = Registry::new();
        let mut events = EventDispatcher::new();
        assert_eq!(process_asset_reloads(&registry, &mut events), 0);
    }
}

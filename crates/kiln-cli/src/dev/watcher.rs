//! Watches the project's source paths and reports changes for rebuilds.
//!
//! Only the configured `dev.watch` paths are watched (directories
//! recursively), so output directories and `node_modules` never trigger a
//! rebuild unless someone lists them.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{CliError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Modified(PathBuf),
    Created(PathBuf),
    Removed(PathBuf),
}

impl FileChange {
    pub fn path(&self) -> &Path {
        match self {
            FileChange::Modified(p) | FileChange::Created(p) | FileChange::Removed(p) => p,
        }
    }
}

/// Keeps the underlying watch handles alive; dropping it stops watching.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    watched: Vec<PathBuf>,
}

impl FileWatcher {
    /// Watch `paths` (relative to `root`). Paths that don't exist are
    /// skipped with a warning. Repeated events for the same file inside
    /// `debounce` are dropped.
    pub fn new(
        root: &Path,
        paths: &[PathBuf],
        debounce: Duration,
    ) -> Result<(Self, mpsc::Receiver<FileChange>)> {
        if !root.exists() {
            return Err(CliError::FileNotFound(root.to_path_buf()));
        }

        let (tx, rx) = mpsc::channel(100);
        // Backends report either the watched path or its resolved form
        let roots = [
            root.to_path_buf(),
            root.canonicalize().unwrap_or_else(|_| root.to_path_buf()),
        ];
        let mut last_event: Option<(PathBuf, Instant)> = None;

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let Ok(event) = res else {
                return;
            };
            for path in &event.paths {
                if roots.iter().all(|root| should_ignore(path, root)) {
                    continue;
                }

                let now = Instant::now();
                if let Some((last_path, last_time)) = &last_event {
                    if last_path == path && now.duration_since(*last_time) < debounce {
                        continue;
                    }
                }
                last_event = Some((path.clone(), now));

                let change = match event.kind {
                    notify::EventKind::Create(_) => FileChange::Created(path.clone()),
                    notify::EventKind::Modify(_) => FileChange::Modified(path.clone()),
                    notify::EventKind::Remove(_) => FileChange::Removed(path.clone()),
                    _ => continue,
                };

                // Full channel: a rebuild is already queued
                let _ = tx.try_send(change);
            }
        })?;

        let mut watched = Vec::new();
        for path in paths {
            let absolute = root.join(path);
            if !absolute.exists() {
                warn!(path = %absolute.display(), "watch path does not exist, skipping");
                continue;
            }
            let mode = if absolute.is_dir() {
                RecursiveMode::Recursive
            } else {
                RecursiveMode::NonRecursive
            };
            watcher.watch(&absolute, mode)?;
            debug!(path = %absolute.display(), "watching");
            watched.push(absolute);
        }

        Ok((
            Self {
                _watcher: watcher,
                watched,
            },
            rx,
        ))
    }

    pub fn watched(&self) -> &[PathBuf] {
        &self.watched
    }
}

/// Hidden files (editor swap files, `.git`) and anything outside the
/// project never trigger a rebuild.
fn should_ignore(path: &Path, root: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };

    relative.components().any(|component| {
        component
            .as_os_str()
            .to_str()
            .is_some_and(|name| name.starts_with('.') && name != "." && name != "..")
    }) || path.to_string_lossy().ends_with('~')
}

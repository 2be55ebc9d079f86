//! Shared state for the development server.
//!
//! The compiler event loop is the only writer of the build status and the
//! bundle cache; middleware only reads. Lifecycle changes are published on a
//! `watch` channel so `PendingServer::ready` can wait for the first good
//! compilation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use crate::bundler::Compilation;
use crate::dev::HotEvent;

/// Buffered hot-update messages per client before new ones are dropped.
const CLIENT_BUFFER: usize = 64;

/// Server lifecycle. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Lifecycle {
    Created,
    Compiling,
    Ready,
    Serving,
    Closed,
}

impl Lifecycle {
    /// A good compilation exists and the server has not closed.
    pub fn is_ready(self) -> bool {
        matches!(self, Lifecycle::Ready | Lifecycle::Serving)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    NotStarted,
    InProgress { started_at: Instant },
    Success { duration_ms: u64, hash: String },
    Failed { errors: Vec<String> },
}

impl BuildStatus {
    pub fn is_in_progress(&self) -> bool {
        matches!(self, BuildStatus::InProgress { .. })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BuildStatus::Success { .. })
    }

    pub fn errors(&self) -> Option<&[String]> {
        match self {
            BuildStatus::Failed { errors } => Some(errors),
            _ => None,
        }
    }
}

pub struct DevServerState {
    status: RwLock<BuildStatus>,

    /// Last good compilation; a failed rebuild leaves it in place
    cache: RwLock<Option<Arc<Compilation>>>,

    clients: RwLock<HashMap<usize, mpsc::Sender<String>>>,
    next_client_id: AtomicUsize,
    lifecycle: watch::Sender<Lifecycle>,

    /// Output path of the templated HTML entry
    html_entry: String,
}

impl DevServerState {
    pub fn new(html_entry: impl Into<String>) -> Self {
        let (lifecycle, _) = watch::channel(Lifecycle::Created);
        Self {
            status: RwLock::new(BuildStatus::NotStarted),
            cache: RwLock::new(None),
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicUsize::new(0),
            lifecycle,
            html_entry: html_entry.into(),
        }
    }

    pub fn html_entry(&self) -> &str {
        &self.html_entry
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }

    /// Move to `next` unless the lifecycle is already at or past it.
    pub fn advance(&self, next: Lifecycle) {
        self.lifecycle.send_if_modified(|current| {
            if next > *current {
                debug!(from = ?*current, to = ?next, "dev server lifecycle");
                *current = next;
                true
            } else {
                false
            }
        });
    }

    pub fn start_build(&self) {
        *self.status.write() = BuildStatus::InProgress {
            started_at: Instant::now(),
        };
        self.advance(Lifecycle::Compiling);
    }

    /// Store a good compilation. Returns true when the HTML entry changed
    /// since the previous good compilation.
    pub fn complete_build(&self, compilation: Compilation, duration_ms: u64) -> bool {
        let hash = compilation.hash().to_string();
        let compilation = Arc::new(compilation);

        let previous = self.cache.write().replace(Arc::clone(&compilation));
        let html_changed = previous.is_some_and(|previous| {
            previous.get(&self.html_entry) != compilation.get(&self.html_entry)
        });

        *self.status.write() = BuildStatus::Success { duration_ms, hash };
        self.advance(Lifecycle::Ready);
        html_changed
    }

    pub fn fail_build(&self, errors: Vec<String>) {
        *self.status.write() = BuildStatus::Failed { errors };
    }

    pub fn status(&self) -> BuildStatus {
        self.status.read().clone()
    }

    pub fn compilation(&self) -> Option<Arc<Compilation>> {
        self.cache.read().clone()
    }

    /// Register a hot-update client.
    pub fn register_client(&self) -> (usize, mpsc::Receiver<String>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(CLIENT_BUFFER);
        self.clients.write().insert(id, tx);
        (id, rx)
    }

    pub fn unregister_client(&self, id: usize) {
        self.clients.write().remove(&id);
    }

    /// Drop every client, ending their event streams.
    pub fn disconnect_all(&self) {
        self.clients.write().clear();
    }

    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }

    /// Push an event to every client without waiting. Clients whose stream
    /// is gone are pruned; clients that are merely behind miss the event.
    pub fn broadcast(&self, event: &HotEvent) {
        let json = match serde_json::to_string(event) {
            Ok(json) => json,
            Err(_) => return,
        };

        let mut closed = Vec::new();
        for (id, tx) in self.clients.read().iter() {
            if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(json.clone()) {
                closed.push(*id);
            }
        }

        if !closed.is_empty() {
            let mut clients = self.clients.write();
            for id in closed {
                clients.remove(&id);
            }
        }
    }
}

pub type SharedState = Arc<DevServerState>;

#[cfg(test)]
mod tests {
    use super::*;

    fn compilation(html: &str, js: &str) -> Compilation {
        Compilation::from_assets([("index.html", html), ("static/js/app.js", js)])
    }

    #[test]
    fn test_build_status_failed() {
        let status = BuildStatus::Failed {
            errors: vec!["Test error".to_string()],
        };
        assert!(!status.is_in_progress());
        assert!(!status.is_success());
        assert_eq!(status.errors(), Some(&["Test error".to_string()][..]));
    }

    #[test]
    fn test_lifecycle_only_moves_forward() {
        let state = DevServerState::new("index.html");
        assert_eq!(state.lifecycle(), Lifecycle::Created);

        state.start_build();
        assert_eq!(state.lifecycle(), Lifecycle::Compiling);

        state.complete_build(compilation("<html>", "a"), 10);
        assert_eq!(state.lifecycle(), Lifecycle::Ready);

        // A later rebuild must not send a ready server back to compiling
        state.start_build();
        assert_eq!(state.lifecycle(), Lifecycle::Ready);
        assert!(state.status().is_in_progress());
    }

    #[test]
    fn test_failed_first_build_is_not_ready() {
        let state = DevServerState::new("index.html");
        state.start_build();
        state.fail_build(vec!["boom".into()]);
        assert!(!state.lifecycle().is_ready());
        assert!(state.compilation().is_none());
    }

    #[test]
    fn test_failed_rebuild_keeps_last_good_bundle() {
        let state = DevServerState::new("index.html");
        state.complete_build(compilation("<html>", "a"), 10);
        state.fail_build(vec!["boom".into()]);

        let kept = state.compilation().unwrap();
        assert_eq!(kept.get("static/js/app.js"), Some(&b"a"[..]));
        assert!(state.status().errors().is_some());
    }

    #[test]
    fn test_html_change_detection() {
        let state = DevServerState::new("index.html");
        assert!(!state.complete_build(compilation("<html>1", "a"), 1));
        assert!(!state.complete_build(compilation("<html>1", "b"), 1));
        assert!(state.complete_build(compilation("<html>2", "b"), 1));
    }

    #[tokio::test]
    async fn test_broadcast_prunes_closed_clients() {
        let state = DevServerState::new("index.html");
        let (_a, mut rx_a) = state.register_client();
        let (_b, rx_b) = state.register_client();
        drop(rx_b);

        state.broadcast(&HotEvent::Reload);
        assert_eq!(state.client_count(), 1);
        assert_eq!(rx_a.recv().await.unwrap(), r#"{"action":"reload"}"#);
    }

    #[tokio::test]
    async fn test_client_registration() {
        let state = DevServerState::new("index.html");
        let (id1, _rx1) = state.register_client();
        let (id2, _rx2) = state.register_client();
        assert_ne!(id1, id2);
        assert_eq!(state.client_count(), 2);

        state.unregister_client(id1);
        assert_eq!(state.client_count(), 1);
        state.disconnect_all();
        assert_eq!(state.client_count(), 0);
    }
}

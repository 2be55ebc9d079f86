//! The compiler task and the event loop that applies its results.
//!
//! The compiler runs one bundler invocation at a time: the initial compile,
//! then one rebuild per burst of file changes. It reports over a one-way
//! channel; [`apply_events`] is the only place server state is written.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kiln_config::{ConfigDescriptor, Environment};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::bundler::{Bundler, Compilation, CompileError};
use crate::ui;

use super::{FileChange, HotEvent, SharedState};

#[derive(Debug)]
pub enum CompileEvent {
    Started,
    Succeeded {
        compilation: Compilation,
        duration: Duration,
    },
    Failed(CompileError),
}

#[derive(Clone)]
pub struct Compiler {
    bundler: Arc<dyn Bundler>,
    descriptor: Arc<ConfigDescriptor>,
    environment: Environment,
}

impl Compiler {
    pub fn new(
        bundler: Arc<dyn Bundler>,
        descriptor: ConfigDescriptor,
        environment: Environment,
    ) -> Self {
        Self {
            bundler,
            descriptor: Arc::new(descriptor),
            environment,
        }
    }

    pub fn descriptor(&self) -> &ConfigDescriptor {
        &self.descriptor
    }

    /// Run the bundler once, reporting start and outcome. Returns false
    /// when nobody is listening any more.
    pub async fn compile_once(&self, events: &mpsc::Sender<CompileEvent>) -> bool {
        if events.send(CompileEvent::Started).await.is_err() {
            return false;
        }

        let started = Instant::now();
        let event = match self.bundler.compile(&self.descriptor, self.environment).await {
            Ok(compilation) => CompileEvent::Succeeded {
                compilation,
                duration: started.elapsed(),
            },
            Err(err) => CompileEvent::Failed(err),
        };
        events.send(event).await.is_ok()
    }

    /// Compile now, then again after every burst of changes. Changes that
    /// arrive within `settle` of each other share one rebuild.
    pub fn spawn(
        self,
        mut changes: Option<mpsc::Receiver<FileChange>>,
        settle: Duration,
        events: mpsc::Sender<CompileEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                if !self.compile_once(&events).await {
                    return;
                }

                let Some(rx) = changes.as_mut() else {
                    return;
                };
                let Some(first) = rx.recv().await else {
                    return;
                };
                tokio::time::sleep(settle).await;

                let mut count = 1;
                while rx.try_recv().is_ok() {
                    count += 1;
                }
                debug!(path = %first.path().display(), count, "rebuilding after changes");
                ui::info(&format!("File changed: {}", first.path().display()));
            }
        })
    }
}

/// Apply compile events to the shared state and tell hot-update clients.
pub fn apply_events(state: SharedState, mut events: mpsc::Receiver<CompileEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            apply(&state, event);
        }
    })
}

pub(crate) fn apply(state: &SharedState, event: CompileEvent) {
    match event {
        CompileEvent::Started => {
            state.start_build();
            state.broadcast(&HotEvent::Building);
        }
        CompileEvent::Succeeded {
            compilation,
            duration,
        } => {
            for warning in compilation.warnings() {
                warn!("{warning}");
            }
            let hash = compilation.hash().to_string();
            let assets = compilation.len();
            let html_changed = state.complete_build(compilation, duration.as_millis() as u64);

            info!(%hash, assets, "compiled");
            ui::success(&format!(
                "Compiled {assets} assets in {}",
                ui::format_duration(duration)
            ));

            state.broadcast(&HotEvent::Built { hash });
            if html_changed {
                state.broadcast(&HotEvent::Reload);
            }
        }
        CompileEvent::Failed(err) => {
            ui::error(&format!(
                "Failed to compile with {} error(s)",
                err.errors.len()
            ));
            for error in &err.errors {
                eprintln!("{error}\n");
            }
            state.broadcast(&HotEvent::Errors {
                errors: err.errors.clone(),
            });
            state.fail_build(err.errors);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::{DevServerState, Lifecycle};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Returns queued results in order.
    struct Scripted(Mutex<Vec<Result<Compilation, CompileError>>>);

    #[async_trait]
    impl Bundler for Scripted {
        async fn compile(
            &self,
            _descriptor: &ConfigDescriptor,
            _environment: Environment,
        ) -> Result<Compilation, CompileError> {
            self.0.lock().remove(0)
        }
    }

    fn compiler(results: Vec<Result<Compilation, CompileError>>) -> Compiler {
        Compiler::new(
            Arc::new(Scripted(Mutex::new(results))),
            ConfigDescriptor::default(),
            Environment::Development,
        )
    }

    #[tokio::test]
    async fn test_compile_once_reports_start_then_outcome() {
        let (tx, mut rx) = mpsc::channel(4);
        let compiler = compiler(vec![Err(CompileError::single("boom"))]);
        assert!(compiler.compile_once(&tx).await);

        assert!(matches!(rx.recv().await, Some(CompileEvent::Started)));
        assert!(matches!(rx.recv().await, Some(CompileEvent::Failed(_))));
    }

    #[tokio::test]
    async fn test_rebuilds_on_change() {
        let (tx, mut rx) = mpsc::channel(8);
        let (change_tx, change_rx) = mpsc::channel(8);
        let compiler = compiler(vec![
            Ok(Compilation::from_assets([("index.html", "1")])),
            Ok(Compilation::from_assets([("index.html", "2")])),
        ]);
        let task = compiler.spawn(Some(change_rx), Duration::from_millis(10), tx);

        assert!(matches!(rx.recv().await, Some(CompileEvent::Started)));
        assert!(matches!(rx.recv().await, Some(CompileEvent::Succeeded { .. })));

        change_tx
            .send(FileChange::Modified("src/main.js".into()))
            .await
            .unwrap();
        assert!(matches!(rx.recv().await, Some(CompileEvent::Started)));
        match rx.recv().await {
            Some(CompileEvent::Succeeded { compilation, .. }) => {
                assert_eq!(compilation.get("index.html"), Some(&b"2"[..]));
            }
            other => panic!("unexpected event {other:?}"),
        }
        task.abort();
    }

    #[tokio::test]
    async fn test_apply_broadcasts_reload_when_html_changes() {
        let state = Arc::new(DevServerState::new("index.html"));
        let (_id, mut client) = state.register_client();

        for html in ["<html>1", "<html>2"] {
            apply(&state, CompileEvent::Started);
            apply(
                &state,
                CompileEvent::Succeeded {
                    compilation: Compilation::from_assets([("index.html", html)]),
                    duration: Duration::from_millis(3),
                },
            );
        }
        assert_eq!(state.lifecycle(), Lifecycle::Ready);

        let mut actions = Vec::new();
        while let Ok(message) = client.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&message).unwrap();
            actions.push(value["action"].as_str().unwrap().to_string());
        }
        assert_eq!(actions, vec!["building", "built", "building", "built", "reload"]);
    }

    #[tokio::test]
    async fn test_apply_failure_is_not_ready() {
        let state = Arc::new(DevServerState::new("index.html"));
        let (_id, mut client) = state.register_client();
        apply(&state, CompileEvent::Started);
        apply(&state, CompileEvent::Failed(CompileError::single("Module not found")));

        assert_eq!(state.lifecycle(), Lifecycle::Compiling);
        client.try_recv().unwrap();
        let errors = client.try_recv().unwrap();
        assert_eq!(errors, r#"{"action":"errors","errors":["Module not found"]}"#);
    }
}

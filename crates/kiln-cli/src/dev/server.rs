//! Development server startup and shutdown.
//!
//! [`DevServer::listen`] wires everything up in a fixed order and binds the
//! port right away, before the first compile finishes. The returned
//! [`PendingServer`] resolves to a [`ServerHandle`] once a good bundle
//! exists.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use kiln_config::{
    plugin_names, posix_join, ConfigDescriptor, ConfigMerger, Environment, ProjectConfig,
    ProxyRule, ProxyTable,
};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info};

use crate::bundler::Bundler;
use crate::error::{CliError, Result};
use crate::ui;

use super::compiler::{apply_events, Compiler};
use super::history::HistoryFallback;
use super::hot::HotMiddleware;
use super::memory::MemoryMiddleware;
use super::middleware::{dispatch, MiddlewareChain};
use super::proxy::ProxyMiddleware;
use super::state::{DevServerState, Lifecycle, SharedState};
use super::static_files::StaticFiles;
use super::watcher::FileWatcher;

/// Listen on every interface unless told otherwise.
pub const DEFAULT_HOST: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// Variable overriding `dev.port`.
pub const PORT_ENV: &str = "PORT";

const HTML_ENTRY: &str = "index.html";
const EVENT_BUFFER: usize = 16;

pub struct DevServer {
    project: ProjectConfig,
    root: PathBuf,
    bundler: Arc<dyn Bundler>,
    environment: Environment,
    host: IpAddr,
    port: Option<u16>,
    watch: bool,
    extra_rules: Vec<ProxyRule>,
}

impl DevServer {
    pub fn new(project: ProjectConfig, root: impl Into<PathBuf>, bundler: Arc<dyn Bundler>) -> Self {
        Self {
            project,
            root: root.into(),
            bundler,
            environment: Environment::Development,
            host: DEFAULT_HOST,
            port: None,
            watch: true,
            extra_rules: Vec::new(),
        }
    }

    /// Value of `NODE_ENV` handed to the bundler.
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn host(mut self, host: IpAddr) -> Self {
        self.host = host;
        self
    }

    /// Fixed port, ignoring `PORT` and `dev.port`. 0 picks a free port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Rebuild on source changes (on by default).
    pub fn watch(mut self, watch: bool) -> Self {
        self.watch = watch;
        self
    }

    /// Extra proxy rule, tried after the configured table. This is how a
    /// predicate context is installed, since settings files can't hold one.
    pub fn proxy_rule(mut self, rule: ProxyRule) -> Self {
        self.extra_rules.push(rule);
        self
    }

    /// Port to bind: explicit override, then `PORT`, then `dev.port`.
    pub fn resolve_port(&self) -> Result<u16> {
        if let Some(port) = self.port {
            return Ok(port);
        }
        match std::env::var(PORT_ENV) {
            Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(|_| {
                CliError::InvalidArgument(format!("{PORT_ENV}={value} is not a valid port"))
            }),
            _ => Ok(self.project.dev.port),
        }
    }

    fn proxy_table(&self) -> ProxyTable {
        let (mut table, skipped) = ProxyTable::build(&self.project.dev.proxy_table);
        for err in &skipped {
            ui::warning(&err.to_string());
        }
        for rule in &self.extra_rules {
            table.push(rule.clone());
        }
        table
    }

    /// Start compiling and bind the listener. Returns as soon as the port
    /// is bound; use [`PendingServer::ready`] to wait for the first good
    /// compilation.
    pub async fn listen(self) -> Result<PendingServer> {
        let port = self.resolve_port()?;
        let dev = &self.project.dev;

        let descriptor = ConfigMerger::new(&self.project, &self.root).dev_config()?;
        let html_entry = html_entry(&descriptor);
        let state: SharedState = Arc::new(DevServerState::new(html_entry.clone()));
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let event_task = apply_events(Arc::clone(&state), events_rx);
        let compiler = Compiler::new(Arc::clone(&self.bundler), descriptor, self.environment);

        let mut chain = MiddlewareChain::new();
        let table = self.proxy_table();
        if !table.is_empty() {
            chain.mount(ProxyMiddleware::new(table));
        }
        chain
            .mount(HistoryFallback::new(posix_join(&[
                "/",
                &dev.assets_public_path,
                &html_entry,
            ])))
            .mount(MemoryMiddleware::new(
                Arc::clone(&state),
                dev.assets_public_path.clone(),
            ))
            .mount(HotMiddleware::new(Arc::clone(&state)))
            .mount(StaticFiles::new(
                &dev.assets_public_path,
                &dev.assets_sub_directory,
                self.root.join(&dev.static_dir),
            ));
        debug!(layers = ?chain.names(), "middleware mounted");

        let (watcher, changes) = if self.watch {
            let (watcher, changes) = FileWatcher::new(
                &self.root,
                &dev.watch,
                Duration::from_millis(dev.debounce_ms),
            )?;
            (Some(watcher), Some(changes))
        } else {
            (None, None)
        };

        let addr = SocketAddr::new(self.host, port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CliError::Listen { addr, source })?;
        let local_addr = listener.local_addr()?;

        let router = Router::new()
            .fallback(dispatch)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(Arc::new(chain));

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let server_task = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
        });
        info!(%local_addr, "dev server listening");

        let compiler_task = compiler.spawn(
            changes,
            Duration::from_millis(dev.debounce_ms),
            events_tx,
        );

        Ok(PendingServer {
            running: Running {
                state,
                local_addr,
                shutdown: Some(shutdown_tx),
                server_task,
                compiler_task,
                event_task,
                watcher,
            },
        })
    }
}

/// Output name of the HTML entry, from the `html` plugin when it sets one.
fn html_entry(descriptor: &ConfigDescriptor) -> String {
    descriptor
        .plugin(plugin_names::HTML)
        .and_then(|plugin| plugin.options.get("filename"))
        .and_then(|filename| filename.as_str())
        .unwrap_or(HTML_ENTRY)
        .to_string()
}

struct Running {
    state: SharedState,
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    server_task: JoinHandle<std::io::Result<()>>,
    compiler_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
    watcher: Option<FileWatcher>,
}

impl Running {
    fn url(&self) -> String {
        let host = if self.local_addr.ip().is_unspecified() {
            "localhost".to_string()
        } else {
            self.local_addr.ip().to_string()
        };
        format!("http://{}:{}", host, self.local_addr.port())
    }

    async fn close(mut self) -> Result<()> {
        self.compiler_task.abort();
        self.event_task.abort();
        drop(self.watcher.take());

        // Open event streams would otherwise hold graceful shutdown forever
        self.state.disconnect_all();
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        let served = (&mut self.server_task).await;
        self.state.advance(Lifecycle::Closed);
        match served {
            Ok(result) => result.map_err(|e| CliError::Server(e.to_string())),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => Err(CliError::Server(e.to_string())),
        }
    }
}

/// A bound server that may still be compiling.
pub struct PendingServer {
    running: Running,
}

impl PendingServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.running.local_addr
    }

    pub fn url(&self) -> String {
        self.running.url()
    }

    pub fn state(&self) -> &SharedState {
        &self.running.state
    }

    /// Wait for the first good compilation. Failed compiles keep waiting;
    /// the next file change triggers another attempt.
    pub async fn ready(self) -> Result<ServerHandle> {
        let mut lifecycle = self.running.state.subscribe();
        let reached = lifecycle
            .wait_for(|stage| stage.is_ready() || *stage == Lifecycle::Closed)
            .await
            .map(|stage| *stage)
            .map_err(|_| CliError::Server("dev server state dropped".to_string()))?;

        if reached == Lifecycle::Closed {
            return Err(CliError::Server("dev server closed before it was ready".to_string()));
        }

        self.running.state.advance(Lifecycle::Serving);
        Ok(ServerHandle {
            running: self.running,
        })
    }

    pub async fn close(self) -> Result<()> {
        self.running.close().await
    }
}

/// A running dev server with at least one good compilation.
pub struct ServerHandle {
    running: Running,
}

impl ServerHandle {
    /// URL for browsers; `localhost` when bound to every interface.
    pub fn url(&self) -> String {
        self.running.url()
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.running.local_addr
    }

    pub fn state(&self) -> &SharedState {
        &self.running.state
    }

    /// Stop accepting connections, stop the compiler and release watches.
    pub async fn close(self) -> Result<()> {
        self.running.close().await
    }
}

//! Development server.
//!
//! One HTTP listener serves everything: proxied API calls, the in-memory
//! bundle, the hot-update event stream and the local static directory. The
//! pieces are [`Middleware`] layers mounted in a fixed order; the compiler
//! runs in its own task and reports over a one-way channel.

pub mod compiler;
pub mod error_overlay;
pub mod history;
pub mod hot;
pub mod memory;
pub mod middleware;
pub mod proxy;
pub mod server;
pub mod state;
pub mod static_files;
pub mod watcher;

pub use compiler::{CompileEvent, Compiler};
pub use middleware::{Flow, Middleware, MiddlewareChain};
pub use server::{DevServer, PendingServer, ServerHandle};
pub use state::{BuildStatus, DevServerState, Lifecycle, SharedState};
pub use watcher::{FileChange, FileWatcher};

use serde::{Deserialize, Serialize};

/// Path of the hot-update event stream.
pub const HOT_PATH: &str = "/__kiln_hmr";

/// Messages pushed to browsers on the hot-update channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HotEvent {
    /// A rebuild started
    Building,

    /// A rebuild finished and the bundle changed
    Built { hash: String },

    /// Sent once on connect so the client knows the current bundle
    Sync { hash: String },

    /// The last rebuild failed
    Errors { errors: Vec<String> },

    /// The HTML entry changed; the page must reload
    Reload,
}

/// MIME type for a served file, by extension.
pub(crate) fn content_type(path: &str) -> &'static str {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("");

    match extension {
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

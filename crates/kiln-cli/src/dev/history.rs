//! Single-page-app fallback: browser navigations to unknown paths get the
//! HTML entry instead of a 404.

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{header, Uri},
};
use tracing::debug;

use super::middleware::{is_read, Flow, Middleware};

pub struct HistoryFallback {
    index: String,
}

impl HistoryFallback {
    /// `index` is the URL path navigations are rewritten to.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
        }
    }

    /// A navigation is a GET or HEAD that accepts HTML and whose last path
    /// segment has no dot (so it isn't a file).
    pub fn should_rewrite(&self, request: &Request) -> bool {
        if !is_read(request) {
            return false;
        }

        let accepts_html = request
            .headers()
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|accept| accept.contains("text/html") || accept.contains("*/*"));
        if !accepts_html {
            return false;
        }

        let path = request.uri().path();
        let last_segment = path.rsplit('/').next().unwrap_or("");
        !last_segment.contains('.') && path != self.index
    }
}

#[async_trait]
impl Middleware for HistoryFallback {
    fn name(&self) -> &'static str {
        "history-fallback"
    }

    async fn handle(&self, mut request: Request) -> Flow {
        if self.should_rewrite(&request) {
            if let Ok(uri) = self.index.parse::<Uri>() {
                debug!(from = %request.uri(), to = %self.index, "history fallback");
                *request.uri_mut() = uri;
            }
        }
        Flow::Next(request)
    }
}

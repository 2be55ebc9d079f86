//! Serves the last good compilation straight from memory.
//!
//! Until the first compile succeeds every request reaching this layer gets a
//! 503 "compiling" page. After a failed rebuild the previous bundle is still
//! served, except that the HTML entry is replaced by the error overlay.

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, Method, StatusCode},
    response::Response,
};

use super::error_overlay;
use super::middleware::{html_response, is_read, Flow, Middleware};
use super::{content_type, SharedState};

pub struct MemoryMiddleware {
    state: SharedState,
    public_path: String,
}

impl MemoryMiddleware {
    pub fn new(state: SharedState, public_path: impl Into<String>) -> Self {
        let mut public_path = public_path.into();
        if !public_path.ends_with('/') {
            public_path.push('/');
        }
        Self { state, public_path }
    }

    /// Output-relative asset path for a URL path under the public path.
    fn asset_path(&self, path: &str) -> Option<String> {
        let relative = if self.public_path == "/" || self.public_path.starts_with("http") {
            path.trim_start_matches('/')
        } else {
            path.strip_prefix(self.public_path.as_str())
                .or_else(|| (path == self.public_path.trim_end_matches('/')).then_some(""))?
        };

        if relative.is_empty() || relative.ends_with('/') {
            Some(format!("{relative}{}", self.state.html_entry()))
        } else {
            Some(relative.to_string())
        }
    }
}

#[async_trait]
impl Middleware for MemoryMiddleware {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn handle(&self, request: Request) -> Flow {
        let Some(compilation) = self.state.compilation() else {
            let mut response = html_response(
                StatusCode::SERVICE_UNAVAILABLE,
                error_overlay::render_compiling(),
            );
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
            return Flow::Respond(response);
        };

        if !is_read(&request) {
            return Flow::Next(request);
        }
        let Some(asset) = self.asset_path(request.uri().path()) else {
            return Flow::Next(request);
        };

        if asset == self.state.html_entry() {
            if let Some(errors) = self.state.status().errors() {
                return Flow::Respond(html_response(
                    StatusCode::OK,
                    error_overlay::render_errors(errors),
                ));
            }
        }

        let Some(bytes) = compilation.get(&asset) else {
            return Flow::Next(request);
        };

        let body = if request.method() == Method::HEAD {
            Body::empty()
        } else {
            Body::from(bytes.to_vec())
        };
        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type(&asset)),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
        Flow::Respond(response)
    }
}

//! Ordered request handling for the dev server.
//!
//! Each layer either answers a request or hands it (possibly rewritten) to
//! the next one. Mount order is part of the server's behavior: the proxy
//! sees requests before the history fallback can rewrite them, and the
//! in-memory bundle shadows the static directory.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    response::Response,
};
use tracing::trace;

/// What a layer did with a request.
pub enum Flow {
    Respond(Response),
    Next(Request),
}

#[async_trait]
pub trait Middleware: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn handle(&self, request: Request) -> Flow;
}

#[derive(Clone, Default)]
pub struct MiddlewareChain {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a layer; it runs after every layer mounted before it.
    pub fn mount(&mut self, layer: impl Middleware + 'static) -> &mut Self {
        self.layers.push(Arc::new(layer));
        self
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    pub async fn dispatch(&self, mut request: Request) -> Response {
        for layer in &self.layers {
            match layer.handle(request).await {
                Flow::Respond(response) => {
                    trace!(layer = layer.name(), "answered");
                    return response;
                }
                Flow::Next(next) => request = next,
            }
        }
        not_found(request.uri().path())
    }
}

/// Axum fallback handler running the whole chain.
pub async fn dispatch(State(chain): State<Arc<MiddlewareChain>>, request: Request) -> Response {
    chain.dispatch(request).await
}

pub(crate) fn not_found(path: &str) -> Response {
    text_response(StatusCode::NOT_FOUND, format!("Cannot GET {path}"))
}

pub(crate) fn text_response(status: StatusCode, body: impl Into<String>) -> Response {
    let mut response = Response::new(Body::from(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub(crate) fn html_response(status: StatusCode, html: String) -> Response {
    let mut response = Response::new(Body::from(html));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("text/html; charset=utf-8"),
    );
    headers.insert(
        header::CACHE_CONTROL,
        header::HeaderValue::from_static("no-cache"),
    );
    response
}

/// Only GET and HEAD are served from local content.
pub(crate) fn is_read(request: &Request) -> bool {
    matches!(
        *request.method(),
        axum::http::Method::GET | axum::http::Method::HEAD
    )
}

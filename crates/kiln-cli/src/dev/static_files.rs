//! Serves the project's static directory under
//! `<assetsPublicPath>/<assetsSubDirectory>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderValue, Method},
    response::Response,
};
use kiln_config::posix_join;
use tracing::trace;

use super::content_type;
use super::middleware::{is_read, Flow, Middleware};

pub struct StaticFiles {
    mount: String,
    dir: PathBuf,
}

impl StaticFiles {
    pub fn new(public_path: &str, sub_directory: &str, dir: impl Into<PathBuf>) -> Self {
        let mount = posix_join(&["/", public_path, sub_directory]);
        Self {
            mount: mount.trim_end_matches('/').to_string(),
            dir: dir.into(),
        }
    }

    pub fn mount(&self) -> &str {
        &self.mount
    }

    /// File under the static directory for `path`, if `path` is inside the
    /// mount and doesn't climb out of it.
    fn resolve(&self, path: &str) -> Option<PathBuf> {
        let relative = path.strip_prefix(self.mount.as_str())?.strip_prefix('/')?;
        let safe = relative
            .split('/')
            .all(|segment| !segment.is_empty() && segment != ".." && !segment.contains('\\'));
        safe.then(|| self.dir.join(Path::new(relative)))
    }
}

#[async_trait]
impl Middleware for StaticFiles {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn handle(&self, request: Request) -> Flow {
        if !is_read(&request) {
            return Flow::Next(request);
        }
        let Some(file) = self.resolve(request.uri().path()) else {
            return Flow::Next(request);
        };

        let bytes = match tokio::fs::read(&file).await {
            Ok(bytes) => bytes,
            Err(_) => return Flow::Next(request),
        };
        trace!(file = %file.display(), "static file");

        let length = bytes.len();
        let body = if request.method() == Method::HEAD {
            Body::empty()
        } else {
            Body::from(bytes)
        };
        let mut response = Response::new(body);
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(content_type(request.uri().path())),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        Flow::Respond(response)
    }
}

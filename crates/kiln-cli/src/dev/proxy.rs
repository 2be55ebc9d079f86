//! Forwards matching requests to upstream servers.
//!
//! Rules are tried in declaration order and the first one whose context
//! matches the request path handles it. Bodies are buffered in both
//! directions.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use kiln_config::{ProxyRule, ProxyTable};
use tracing::{debug, warn};

use super::middleware::{text_response, Flow, Middleware};

/// Headers that describe a single connection and must not be forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub struct ProxyMiddleware {
    table: ProxyTable,
    client: reqwest::Client,
}

impl ProxyMiddleware {
    pub fn new(table: ProxyTable) -> Self {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("kiln/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { table, client }
    }

    pub fn table(&self) -> &ProxyTable {
        &self.table
    }

    async fn forward(&self, rule: &ProxyRule, request: Request) -> Response {
        let url = rule.upstream_url(request.uri().path(), request.uri().query());
        let (parts, body) = request.into_parts();

        let body = match to_bytes(body, usize::MAX).await {
            Ok(body) => body,
            Err(e) => {
                return text_response(StatusCode::BAD_REQUEST, format!("Failed to read request body: {e}"))
            }
        };

        let mut headers = strip_hop_by_hop(parts.headers);
        headers.remove(header::CONTENT_LENGTH);
        if rule.change_origin {
            if let Ok(host) = HeaderValue::from_str(&rule.target_authority()) {
                headers.insert(header::HOST, host);
            }
        }
        for (name, value) in &rule.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => warn!(rule = %rule.label, header = %name, "ignoring invalid proxy header"),
            }
        }

        debug!(rule = %rule.label, method = %parts.method, upstream = %url, "proxying");

        let upstream = self
            .client
            .request(parts.method, url.clone())
            .headers(headers)
            .body(body)
            .send()
            .await;

        let upstream = match upstream {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(rule = %rule.label, upstream = %url, error = %e, "proxy request failed");
                return text_response(
                    StatusCode::BAD_GATEWAY,
                    format!("Error occurred while proxying to {url}: {e}"),
                );
            }
        };

        let status = upstream.status();
        let headers = strip_hop_by_hop(upstream.headers().clone());
        let bytes = match upstream.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                return text_response(
                    StatusCode::BAD_GATEWAY,
                    format!("Failed to read upstream response from {url}: {e}"),
                )
            }
        };

        let mut response = Response::new(Body::from(bytes));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response.headers_mut().remove(header::CONTENT_LENGTH);
        response
    }
}

#[async_trait]
impl Middleware for ProxyMiddleware {
    fn name(&self) -> &'static str {
        "proxy"
    }

    async fn handle(&self, request: Request) -> Flow {
        match self.table.first_match(request.uri().path()) {
            Some(rule) => Flow::Respond(self.forward(rule, request).await),
            None => Flow::Next(request),
        }
    }
}

fn strip_hop_by_hop(mut headers: HeaderMap) -> HeaderMap {
    // Connection may name further per-hop headers
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
    headers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let headers = strip_hop_by_hop(headers);
        assert!(headers.get("x-trace").is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert!(headers.get(header::TRANSFER_ENCODING).is_none());
        assert_eq!(headers[header::ACCEPT], "application/json");
    }

    #[tokio::test]
    async fn test_unmatched_requests_pass_through() {
        let middleware = ProxyMiddleware::new(ProxyTable::default());
        let request = Request::builder().uri("/api/items").body(Body::empty()).unwrap();
        assert!(matches!(middleware.handle(request).await, Flow::Next(_)));
    }
}

//! Relay engine: forwards an intercepted request to the real backend.
//!
//! Requests and responses are fully buffered. Only allow-listed headers are
//! copied in either direction. Failures are returned to the caller, which
//! surfaces them to the client instead of hiding them.

use super::client::HttpClient;
use super::headers::{filter_request_headers, filter_response_headers};
use crate::error::RelayError;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::http::request::Parts;
use hyper::{Request, Response, Uri};
use tracing::debug;

pub struct Relay {
    http_client: HttpClient,
    target_authority: String,
}

impl Relay {
    pub fn new(http_client: HttpClient, target_authority: String) -> Self {
        Self {
            http_client,
            target_authority,
        }
    }

    pub fn target_authority(&self) -> &str {
        &self.target_authority
    }

    /// Send the request to the backend and rebuild its response.
    pub async fn relay(&self, parts: &Parts, body: Bytes) -> Result<Response<Full<Bytes>>, RelayError> {
        let uri = relay_uri(&parts.uri, &self.target_authority)?;
        debug!("Relaying {} to: {}", parts.method, uri);

        let mut outbound = Request::builder()
            .method(parts.method.clone())
            .uri(uri)
            .body(Full::new(body))?;
        *outbound.headers_mut() = filter_request_headers(&parts.headers);

        let backend_response = self.http_client.request(outbound).await?;
        let (backend_parts, backend_body) = backend_response.into_parts();
        let body = backend_body.collect().await?.to_bytes();

        debug!(
            "Backend answered {} with {} ({} bytes)",
            parts.uri.path(),
            backend_parts.status,
            body.len()
        );

        let mut response = Response::new(Full::new(body));
        *response.status_mut() = backend_parts.status;
        *response.headers_mut() = filter_response_headers(&backend_parts.headers);
        Ok(response)
    }

    /// Drop the outbound client, closing its pooled connections.
    pub fn close(self) {
        debug!("Relay client for {} closed", self.target_authority);
    }
}

/// Rewrite `inbound` to point at `target_authority`, keeping scheme, path and query.
pub fn relay_uri(inbound: &Uri, target_authority: &str) -> Result<Uri, RelayError> {
    let scheme = inbound.scheme_str().unwrap_or("http");
    let path_and_query = inbound
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let uri = format!("{scheme}://{target_authority}{path_and_query}");
    uri.parse().map_err(|_| RelayError::InvalidUri(uri))
}

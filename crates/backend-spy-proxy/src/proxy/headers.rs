//! Header allow-lists for relayed traffic.
//!
//! Only a fixed set of headers crosses the proxy in each direction. Hop-by-hop
//! and framing headers (`host`, `content-length`, `transfer-encoding`, ...) are
//! always rebuilt by the HTTP stack rather than copied.
//!
//! `HeaderName` is stored lowercase, so matching is case-insensitive.

use hyper::header::HeaderMap;

/// Headers copied from the client's request onto the relayed request.
pub const RELAYABLE_REQUEST_HEADERS: [&str; 4] = [
    "authorization",
    "x-wandb-username",
    "user-agent",
    "content-type",
];

/// Headers copied from the backend's response onto the relayed response.
pub const RELAYABLE_RESPONSE_HEADERS: [&str; 1] = ["content-type"];

/// Keep only the request headers that may be forwarded to the backend.
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    retain_allowed(headers, &RELAYABLE_REQUEST_HEADERS)
}

/// Keep only the response headers that may be returned to the client.
pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    retain_allowed(headers, &RELAYABLE_RESPONSE_HEADERS)
}

fn retain_allowed(headers: &HeaderMap, allowed: &[&str]) -> HeaderMap {
    let mut filtered = HeaderMap::new();
    for (name, value) in headers.iter() {
        if allowed.contains(&name.as_str()) {
            filtered.append(name.clone(), value.clone());
        }
    }
    filtered
}

//! Proxy server module.
//!
//! This module provides the interception proxy:
//! - Transparent relay of the proxied endpoints to the real backend
//! - Spy interception with failure isolation
//! - Deterministic start/stop on a dedicated server thread
//!
//! # Module Structure
//!
//! - `server` - ProxyServer lifecycle (start, stop, spy attachment)
//! - `dispatch` - Per-request interception logic
//! - `routes` - Endpoint table for the proxied paths
//! - `relay` - Request forwarding to the real backend
//! - `headers` - Header allow-lists
//! - `client` - Outbound HTTP client creation
//! - `network` - Listener utilities
//! - `response_ext` - Response body helpers

mod client;
mod dispatch;
mod headers;
mod network;
mod relay;
mod response_ext;
mod routes;
mod server;

pub use dispatch::intercept;
pub use headers::{
    filter_request_headers, filter_response_headers, RELAYABLE_REQUEST_HEADERS,
    RELAYABLE_RESPONSE_HEADERS,
};
pub use relay::relay_uri;
pub use response_ext::error_response;
pub use routes::{Endpoint, EndpointTable, Route, FILE_STREAM_PATH, GRAPHQL_PATH};
pub use server::ProxyServer;

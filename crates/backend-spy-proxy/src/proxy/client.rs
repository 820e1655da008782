//! Outbound HTTP client used to relay requests to the real backend.
//!
//! One client is created per proxy server and shared by every request task.
//! It is dropped, closing its pooled connections, only after the listener
//! has stopped.

use crate::config::ConnectionPoolConfig;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::debug;

/// Type alias for the HTTP client used by the proxy.
pub type HttpClient = Client<HttpConnector, Full<Bytes>>;

/// Create the shared relay client with connection pooling.
pub fn create_http_client(pool: &ConnectionPoolConfig) -> HttpClient {
    let mut http_connector = HttpConnector::new();
    http_connector.set_keepalive(Some(Duration::from_secs(pool.keepalive_timeout_secs)));
    http_connector.set_connect_timeout(Some(Duration::from_secs(pool.connect_timeout_secs)));
    http_connector.set_nodelay(true);

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(pool.idle_timeout_secs))
        .pool_max_idle_per_host(pool.max_idle_per_host)
        .build(http_connector);

    debug!(
        "Relay client configured: max_idle={}, idle_timeout={}s, connect_timeout={}s",
        pool.max_idle_per_host, pool.idle_timeout_secs, pool.connect_timeout_secs
    );

    http_client
}

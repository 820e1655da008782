//! Error types for the spy proxy.
//!
//! Two error families with different handling:
//! - `ProxyError` reports misuse of the harness (startup, shutdown, attach
//!   conflicts, bad configuration). These abort the calling test.
//! - `RelayError` reports failures talking to the real backend. These are
//!   surfaced to the HTTP client as a failed response.
//!
//! Failures inside a spy handler are neither: they are logged and swallowed
//! by the dispatcher.

use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Backend proxy server failed to start within {0:?}")]
    StartupFailed(Duration),
    #[error("Backend proxy server failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),
    #[error("Backend proxy server failed to shut down within {0:?}")]
    ShutdownFailed(Duration),
    #[error("A spy is already attached")]
    AlreadyAttached,
    #[error("Invalid proxy configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to launch backend proxy runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid relay target URI '{0}'")]
    InvalidUri(String),
    #[error("Failed to build relay request: {0}")]
    Build(#[from] hyper::http::Error),
    #[error("Relay request to backend failed: {0}")]
    Request(#[from] hyper_util::client::legacy::Error),
    #[error("Failed to read backend response body: {0}")]
    Body(#[from] hyper::Error),
}

//! Configuration types for the backend spy proxy.

mod pool;

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ProxyError;

pub use pool::ConnectionPoolConfig;

/// Options recognized when constructing a proxy server.
///
/// Only `proxy_port`, `target_host` and `target_port` are required; the rest
/// fall back to defaults suitable for a test session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyConfig {
    /// Port to listen on at 127.0.0.1 (0 lets the OS pick one)
    pub proxy_port: u16,
    /// Hostname of the real backend
    pub target_host: String,
    /// Port of the real backend
    pub target_port: u16,
    /// How long `start` waits for the listener to go live
    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,
    /// How long `stop` waits for the server thread to finish
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,
}

fn default_startup_timeout() -> u64 {
    10
}

fn default_shutdown_timeout() -> u64 {
    30
}

impl ProxyConfig {
    pub fn new(proxy_port: u16, target_host: impl Into<String>, target_port: u16) -> Self {
        Self {
            proxy_port,
            target_host: target_host.into(),
            target_port,
            startup_timeout_secs: default_startup_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            connection_pool: ConnectionPoolConfig::default(),
        }
    }

    /// Parse and validate a YAML configuration.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let config: ProxyConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ProxyError> {
        if self.target_host.trim().is_empty() {
            return Err(ProxyError::InvalidConfig(
                "target_host must not be empty".to_string(),
            ));
        }
        if self.target_port == 0 {
            return Err(ProxyError::InvalidConfig(
                "target_port must be a non-zero port".to_string(),
            ));
        }
        if self.startup_timeout_secs == 0 || self.shutdown_timeout_secs == 0 {
            return Err(ProxyError::InvalidConfig(
                "startup and shutdown timeouts must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `host:port` of the real backend.
    pub fn target_authority(&self) -> String {
        format!("{}:{}", self.target_host, self.target_port)
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

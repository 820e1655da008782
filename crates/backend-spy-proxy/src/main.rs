use anyhow::Context;
use backend_spy_proxy::{ProxyConfig, ProxyServer};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Relay a backend's GraphQL and file_stream endpoints through a local proxy.
#[derive(Parser, Debug)]
#[command(name = "backend-spy-proxy", version)]
struct Args {
    /// Port to listen on at 127.0.0.1 (0 picks a free port)
    #[arg(short, long, env = "SPY_PROXY_PORT")]
    port: Option<u16>,
    /// Hostname of the real backend
    #[arg(long, env = "SPY_PROXY_TARGET_HOST")]
    target_host: Option<String>,
    /// Port of the real backend
    #[arg(long, env = "SPY_PROXY_TARGET_PORT")]
    target_port: Option<u16>,
    /// YAML configuration file; flags override its values
    #[arg(short, long, env = "SPY_PROXY_CONFIG")]
    config: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> anyhow::Result<ProxyConfig> {
        let mut config = match self.config {
            Some(path) => ProxyConfig::from_file(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => ProxyConfig::new(
                self.port.unwrap_or_default(),
                self.target_host
                    .clone()
                    .context("--target-host is required without --config")?,
                self.target_port
                    .context("--target-port is required without --config")?,
            ),
        };

        if let Some(port) = self.port {
            config.proxy_port = port;
        }
        if let Some(host) = self.target_host {
            config.target_host = host;
        }
        if let Some(port) = self.target_port {
            config.target_port = port;
        }
        config.validate()?;
        Ok(config)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Args::parse().into_config()?;

    // start/stop block on the server thread; keep them off the runtime.
    let mut server = tokio::task::spawn_blocking(move || ProxyServer::start(config)).await??;
    info!("Proxy ready at {}", server.url());

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    tokio::task::spawn_blocking(move || server.stop()).await??;
    Ok(())
}

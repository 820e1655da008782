//! ProxyServer lifecycle.
//!
//! The server runs on its own OS thread with its own tokio runtime, so the
//! test that owns it can stay synchronous. `start` returns once the listener
//! is live; `stop` returns once the thread has drained in-flight exchanges
//! and closed the outbound client.

use super::client::create_http_client;
use super::dispatch::{handle_request, ProxyApp};
use super::network::create_listener;
use super::relay::Relay;
use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::spy::{Spy, SpyGuard, SpySlot};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Upper bound for tearing down the runtime once serving has finished.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_secs(1);

type StartupResult = Result<SocketAddr, ProxyError>;

/// A running spy proxy. Dropping it stops the server.
pub struct ProxyServer {
    config: ProxyConfig,
    local_addr: SocketAddr,
    spies: Arc<SpySlot>,
    running: Option<ServerThread>,
}

struct ServerThread {
    shutdown_tx: watch::Sender<bool>,
    done_rx: mpsc::Receiver<()>,
    handle: thread::JoinHandle<()>,
}

impl ProxyServer {
    /// Start the proxy on `127.0.0.1:<proxy_port>` and wait until it accepts
    /// connections.
    pub fn start(config: ProxyConfig) -> Result<Self, ProxyError> {
        config.validate()?;

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.proxy_port));
        let spies = Arc::new(SpySlot::new());

        let (ready_tx, ready_rx) = mpsc::channel::<StartupResult>();
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let thread_config = config.clone();
        let thread_spies = Arc::clone(&spies);
        let handle = thread::Builder::new()
            .name(format!("spy-proxy-{}", config.proxy_port))
            .spawn(move || {
                run_server_thread(thread_config, thread_spies, addr, ready_tx, shutdown_rx);
                let _ = done_tx.send(());
            })
            .map_err(ProxyError::Runtime)?;

        let local_addr = match wait_until_ready(&ready_rx, config.startup_timeout()) {
            Ok(local_addr) => local_addr,
            Err(e @ ProxyError::StartupFailed(_)) => {
                let _ = shutdown_tx.send(true);
                return Err(e);
            }
            Err(e) => {
                let _ = handle.join();
                return Err(e);
            }
        };

        info!(
            "Backend proxy listening on http://{}, relaying to http://{}",
            local_addr,
            config.target_authority()
        );

        Ok(Self {
            config,
            local_addr,
            spies,
            running: Some(ServerThread {
                shutdown_tx,
                done_rx,
                handle,
            }),
        })
    }

    /// Stop accepting connections and wait for the server thread to finish.
    ///
    /// Calling `stop` on a stopped server does nothing.
    pub fn stop(&mut self) -> Result<(), ProxyError> {
        let Some(server) = self.running.take() else {
            return Ok(());
        };

        let _ = server.shutdown_tx.send(true);

        let shutdown_timeout = self.config.shutdown_timeout();
        match server.done_rx.recv_timeout(shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if server.handle.join().is_err() {
                    error!("Backend proxy thread for {} panicked", self.local_addr);
                }
                info!("Backend proxy on {} stopped", self.local_addr);
                Ok(())
            }
            Err(RecvTimeoutError::Timeout) => Err(ProxyError::ShutdownFailed(shutdown_timeout)),
        }
    }

    /// Attach a spy for the lifetime of the returned guard.
    pub fn attach<S: Spy + 'static>(&self, spy: S) -> Result<SpyGuard<S>, ProxyError> {
        self.spies.attach(spy)
    }

    pub fn spy_slot(&self) -> &Arc<SpySlot> {
        &self.spies
    }

    /// Address the listener is bound to (resolves `proxy_port = 0`).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Base URL clients should use, e.g. `http://127.0.0.1:9000`.
    pub fn url(&self) -> String {
        format!("http://{}", self.local_addr)
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!("{}", e);
        }
    }
}

/// Block until the server thread reports its bound address or `timeout` passes.
fn wait_until_ready(
    ready_rx: &mpsc::Receiver<StartupResult>,
    timeout: Duration,
) -> StartupResult {
    match ready_rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
            Err(ProxyError::StartupFailed(timeout))
        }
    }
}

fn run_server_thread(
    config: ProxyConfig,
    spies: Arc<SpySlot>,
    addr: SocketAddr,
    ready_tx: mpsc::Sender<StartupResult>,
    shutdown_rx: watch::Receiver<bool>,
) {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("spy-proxy-worker")
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready_tx.send(Err(ProxyError::Runtime(e)));
            return;
        }
    };

    runtime.block_on(serve_then_close(config, spies, addr, ready_tx, shutdown_rx));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
}

/// Bind, report readiness, serve until shutdown, then close the relay client.
async fn serve_then_close(
    config: ProxyConfig,
    spies: Arc<SpySlot>,
    addr: SocketAddr,
    ready_tx: mpsc::Sender<StartupResult>,
    shutdown_rx: watch::Receiver<bool>,
) {
    let bound = create_listener(addr).and_then(|listener| {
        let local_addr = listener.local_addr()?;
        Ok((listener, local_addr))
    });
    let (listener, local_addr) = match bound {
        Ok(bound) => bound,
        Err(e) => {
            let _ = ready_tx.send(Err(ProxyError::Bind(addr, e)));
            return;
        }
    };

    let relay = Relay::new(
        create_http_client(&config.connection_pool),
        config.target_authority(),
    );
    let app = Arc::new(ProxyApp::new(spies, relay));

    if ready_tx.send(Ok(local_addr)).is_err() {
        // start() already gave up on us.
        return;
    }

    serve(listener, Arc::clone(&app), shutdown_rx).await;

    match Arc::try_unwrap(app) {
        Ok(app) => app.close(),
        Err(_) => debug!("Relay client for {} closes with its last connection task", local_addr),
    }
}

async fn serve(listener: TcpListener, app: Arc<ProxyApp>, mut shutdown_rx: watch::Receiver<bool>) {
    let graceful = GracefulShutdown::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, remote_addr) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Backend proxy accept error: {}", e);
                        continue;
                    }
                };

                let app = Arc::clone(&app);
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let app = Arc::clone(&app);
                    async move { handle_request(app, req).await }
                });

                let connection = graceful.watch(http1::Builder::new().serve_connection(io, service));
                tokio::spawn(async move {
                    if let Err(err) = connection.await {
                        debug!("Error serving connection from {}: {}", remote_addr, err);
                    }
                });
            }
            _ = shutdown_rx.changed() => {
                debug!("Backend proxy shutdown requested");
                break;
            }
        }
    }

    // Refuse new connections before waiting on the in-flight ones.
    drop(listener);
    graceful.shutdown().await;
}

//! Test-support HTTP interception proxy.
//!
//! A `ProxyServer` sits between a client under test and its real backend.
//! By default it relays `POST /graphql` and
//! `POST /files/{entity}/{project}/{run_id}/file_stream` unchanged apart from
//! host and header rewriting. A test can attach one `Spy` at a time to see
//! those requests and, optionally, answer them itself.
//!
//! ```no_run
//! use backend_spy_proxy::{ProxyConfig, ProxyServer, Spy};
//!
//! struct Quiet;
//! impl Spy for Quiet {}
//!
//! let server = ProxyServer::start(ProxyConfig::new(0, "localhost", 8080))?;
//! {
//!     let _spy = server.attach(Quiet)?;
//!     // drive the client against server.url()
//! }
//! # Ok::<(), backend_spy_proxy::ProxyError>(())
//! ```

pub mod config;
pub mod error;
pub mod proxy;
pub mod spy;

pub use config::{ConnectionPoolConfig, ProxyConfig};
pub use error::{ProxyError, RelayError};
pub use proxy::ProxyServer;
pub use spy::{Spy, SpyGuard, SpyResponse, SpySlot};

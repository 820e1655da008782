//! Spies: test-supplied observers attached to a running proxy.
//!
//! A spy sees every intercepted request before it is relayed and may
//! answer it with a fabricated response instead. How a spy records
//! requests and what it asserts on is up to the test.

mod slot;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::Full;
use hyper::Response;

pub use slot::{SpyGuard, SpySlot};

/// A response produced by a spy in place of the real backend's.
pub type SpyResponse = Response<Full<Bytes>>;

/// Handlers invoked by the proxy for each intercepted endpoint.
///
/// Returning `Ok(None)` lets the request through to the real backend.
/// Returning an error or panicking has the same effect: the failure is
/// logged and the request is relayed.
///
/// Handlers are synchronous and are called from the proxy's request
/// tasks, so they must not block for long.
pub trait Spy: Send + Sync {
    /// Called for `POST /graphql`.
    fn post_graphql(&self, body: &[u8]) -> Result<Option<SpyResponse>> {
        let _ = body;
        Ok(None)
    }

    /// Called for `POST /files/{entity}/{project}/{run_id}/file_stream`.
    fn post_file_stream(
        &self,
        body: &[u8],
        entity: &str,
        project: &str,
        run_id: &str,
    ) -> Result<Option<SpyResponse>> {
        let _ = (body, entity, project, run_id);
        Ok(None)
    }
}

//! Interception dispatcher.
//!
//! Every recognized request goes through the same steps:
//! 1. buffer the request body
//! 2. snapshot the attached spy, if any
//! 3. let the spy answer; failures inside the spy are logged and ignored
//! 4. otherwise relay to the real backend
//!
//! Spy failures and relay failures are handled differently. A broken spy
//! must not break the relay path, while a broken relay must stay visible
//! to the client.

use super::relay::Relay;
use super::response_ext::{error_response, ProxyBody, ResponseExt};
use super::routes::{Endpoint, EndpointTable, Route};
use crate::spy::{Spy, SpyResponse, SpySlot};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::{Request, Response, StatusCode};
use std::any::Any;
use std::convert::Infallible;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// State shared by every request task of one proxy server.
pub struct ProxyApp {
    routes: EndpointTable,
    spies: Arc<SpySlot>,
    relay: Relay,
}

impl ProxyApp {
    pub fn new(spies: Arc<SpySlot>, relay: Relay) -> Self {
        Self {
            routes: EndpointTable::new(),
            spies,
            relay,
        }
    }

    /// Release the outbound client. Consumes the app, so it happens once.
    pub fn close(self) {
        self.relay.close();
    }
}

/// Service entry point for the proxy's connections.
pub async fn handle_request(
    app: Arc<ProxyApp>,
    req: Request<Incoming>,
) -> Result<Response<ProxyBody>, Infallible> {
    let route = app.routes.resolve(req.method(), req.uri().path());

    let response = match route {
        Route::Endpoint(endpoint) => dispatch(&app, endpoint, req).await,
        Route::MethodNotAllowed => {
            debug!("Rejecting {} {}", req.method(), req.uri().path());
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
        }
        Route::NotFound => {
            debug!("No endpoint for {} {}", req.method(), req.uri().path());
            error_response(StatusCode::NOT_FOUND, "Not Found")
        }
    };

    Ok(response.into_boxed())
}

async fn dispatch(app: &ProxyApp, endpoint: Endpoint, req: Request<Incoming>) -> Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read {} request body: {}", endpoint.name(), e);
            return error_response(StatusCode::BAD_REQUEST, "Failed to read request body");
        }
    };

    if let Some(spy) = app.spies.current() {
        if let Some(response) = intercept(spy.as_ref(), &endpoint, &body) {
            debug!(
                "Spy answered {} request with {}",
                endpoint.name(),
                response.status()
            );
            return response;
        }
    }

    match app.relay.relay(&parts, body).await {
        Ok(response) => response,
        Err(e) => {
            error!(
                "Failed to relay {} {} to {}: {}",
                parts.method,
                parts.uri.path(),
                app.relay.target_authority(),
                e
            );
            error_response(StatusCode::BAD_GATEWAY, &e.to_string())
        }
    }
}

/// Give `spy` a chance to answer the request.
///
/// Returns `None` when the spy declines, returns an error, or panics. Errors
/// and panics are logged and never propagate.
pub fn intercept(spy: &dyn Spy, endpoint: &Endpoint, body: &[u8]) -> Option<SpyResponse> {
    let outcome = catch_unwind(AssertUnwindSafe(|| match endpoint {
        Endpoint::GraphQl => spy.post_graphql(body),
        Endpoint::FileStream {
            entity,
            project,
            run_id,
        } => spy.post_file_stream(body, entity, project, run_id),
    }));

    match outcome {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!(
                "Spy {} handler failed, relaying request: {:?}",
                endpoint.name(),
                err
            );
            None
        }
        Err(payload) => {
            error!(
                "Spy {} handler panicked, relaying request: {}",
                endpoint.name(),
                panic_message(payload.as_ref())
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

//! Response helpers shared by the dispatcher and relay.
//!
//! Handlers produce `Response<Full<Bytes>>`; the connection layer wants a
//! boxed body. `ResponseExt::into_boxed` bridges the two.

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use std::convert::Infallible;

/// Body type returned from the proxy's service function.
pub type ProxyBody = BoxBody<Bytes, hyper::Error>;

/// Extension trait for `Response<Full<Bytes>>` providing common transformations.
pub trait ResponseExt {
    /// Convert the response body into a boxed body type.
    fn into_boxed(self) -> Response<ProxyBody>;
}

impl ResponseExt for Response<Full<Bytes>> {
    fn into_boxed(self) -> Response<ProxyBody> {
        self.map(|b| BoxBody::new(b.map_err(|never: Infallible| match never {})))
    }
}

/// JSON error response, e.g. `{"error": "Bad Gateway"}`.
pub fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message }).to_string();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_boxed_preserves_status() {
        let response = Response::builder()
            .status(404)
            .body(Full::new(Bytes::from("not found")))
            .unwrap();

        let boxed = response.into_boxed();
        assert_eq!(boxed.status(), 404);
    }

    #[test]
    fn test_into_boxed_preserves_headers() {
        let response = Response::builder()
            .header("X-Custom", "value")
            .body(Full::new(Bytes::from("test")))
            .unwrap();

        let boxed = response.into_boxed();
        assert_eq!(
            boxed.headers().get("X-Custom").map(|v| v.to_str().unwrap()),
            Some("value")
        );
    }

    #[tokio::test]
    async fn test_error_response_body() {
        let response = error_response(StatusCode::BAD_GATEWAY, "Bad Gateway");
        assert_eq!(response.status(), 502);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Bad Gateway");
    }

    #[tokio::test]
    async fn test_error_response_escapes_message() {
        let response = error_response(StatusCode::BAD_REQUEST, r#"bad "quote""#);
        assert_eq!(response.status(), 400);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], r#"bad "quote""#);
    }
}

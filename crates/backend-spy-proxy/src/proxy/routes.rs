//! Endpoint table: the request shapes the proxy intercepts.
//!
//! Only two shapes are proxied. Anything else is answered locally with
//! 404 (unknown path) or 405 (known path, wrong method) and never reaches
//! the backend.

use hyper::Method;
use matchit::Router;

pub const GRAPHQL_PATH: &str = "/graphql";
pub const FILE_STREAM_PATH: &str = "/files/{entity}/{project}/{run_id}/file_stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EndpointKind {
    GraphQl,
    FileStream,
}

/// A recognized endpoint with its path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    GraphQl,
    FileStream {
        entity: String,
        project: String,
        run_id: String,
    },
}

impl Endpoint {
    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::GraphQl => "graphql",
            Endpoint::FileStream { .. } => "file_stream",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Endpoint(Endpoint),
    MethodNotAllowed,
    NotFound,
}

pub struct EndpointTable {
    router: Router<EndpointKind>,
}

impl EndpointTable {
    pub fn new() -> Self {
        let mut router = Router::new();
        router
            .insert(GRAPHQL_PATH, EndpointKind::GraphQl)
            .expect("graphql route is a valid pattern");
        router
            .insert(FILE_STREAM_PATH, EndpointKind::FileStream)
            .expect("file_stream route is a valid pattern");
        Self { router }
    }

    /// Match a request line against the table.
    pub fn resolve(&self, method: &Method, path: &str) -> Route {
        let Ok(matched) = self.router.at(path) else {
            return Route::NotFound;
        };

        if *method != Method::POST {
            return Route::MethodNotAllowed;
        }

        let endpoint = match matched.value {
            EndpointKind::GraphQl => Endpoint::GraphQl,
            EndpointKind::FileStream => {
                let param =
                    |name: &str| decode_segment(matched.params.get(name).unwrap_or_default());
                Endpoint::FileStream {
                    entity: param("entity"),
                    project: param("project"),
                    run_id: param("run_id"),
                }
            }
        };

        Route::Endpoint(endpoint)
    }
}

/// Percent-decode a path segment, keeping it raw if it is not valid UTF-8.
fn decode_segment(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

impl Default for EndpointTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_route() {
        let table = EndpointTable::new();
        assert_eq!(
            table.resolve(&Method::POST, "/graphql"),
            Route::Endpoint(Endpoint::GraphQl)
        );
    }

    #[test]
    fn test_file_stream_route_extracts_params() {
        let table = EndpointTable::new();
        assert_eq!(
            table.resolve(&Method::POST, "/files/acme/proj1/run42/file_stream"),
            Route::Endpoint(Endpoint::FileStream {
                entity: "acme".to_string(),
                project: "proj1".to_string(),
                run_id: "run42".to_string(),
            })
        );
    }

    #[test]
    fn test_file_stream_params_are_percent_decoded() {
        let table = EndpointTable::new();
        assert_eq!(
            table.resolve(&Method::POST, "/files/my%20team/proj%2Dx/run%3A1/file_stream"),
            Route::Endpoint(Endpoint::FileStream {
                entity: "my team".to_string(),
                project: "proj-x".to_string(),
                run_id: "run:1".to_string(),
            })
        );
    }

    #[test]
    fn test_undecodable_param_kept_raw() {
        let table = EndpointTable::new();
        let Route::Endpoint(Endpoint::FileStream { entity, .. }) =
            table.resolve(&Method::POST, "/files/bad%FFname/p/r/file_stream")
        else {
            panic!("expected a file_stream endpoint");
        };
        assert_eq!(entity, "bad%FFname");
    }

    #[test]
    fn test_wrong_method_on_known_path() {
        let table = EndpointTable::new();
        assert_eq!(
            table.resolve(&Method::GET, "/graphql"),
            Route::MethodNotAllowed
        );
        assert_eq!(
            table.resolve(&Method::PUT, "/files/a/b/c/file_stream"),
            Route::MethodNotAllowed
        );
    }

    #[test]
    fn test_unknown_paths() {
        let table = EndpointTable::new();
        for path in [
            "/",
            "/graphql/extra",
            "/files/a/b/file_stream",
            "/files/a/b/c/d/file_stream",
            "/files/a/b/c/other",
            "/api/v1/runs",
        ] {
            assert_eq!(table.resolve(&Method::POST, path), Route::NotFound, "{path}");
        }
    }

    #[test]
    fn test_endpoint_names() {
        assert_eq!(Endpoint::GraphQl.name(), "graphql");
        let stream = Endpoint::FileStream {
            entity: "e".to_string(),
            project: "p".to_string(),
            run_id: "r".to_string(),
        };
        assert_eq!(stream.name(), "file_stream");
    }
}

//! Radix-tree request router.
//!
//! One tree of pipelines that take every method and gate it themselves.
//! A path that matches nothing is answered with the JSON `404`.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::envelope;
use crate::handler::BoxedHandler;
use crate::pipeline::Pipeline;
use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
/// Registrations return `self` so they chain naturally.
pub struct Router {
    routes: MatchitRouter<BoxedHandler>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: MatchitRouter::new() }
    }

    /// Register a pipeline for `path`. It receives every method, including
    /// `OPTIONS` and ones it does not allow.
    ///
    /// Panics on a path matchit rejects or one registered twice.
    pub fn route(mut self, path: &str, pipeline: Pipeline) -> Self {
        self.routes
            .insert(path, Arc::new(pipeline))
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Routes one request and produces one response.
    pub async fn dispatch(&self, req: Request) -> Response {
        match self.lookup(req.path()) {
            Some((handler, params)) => handler.call(req.with_params(params)).await,
            None => not_found(),
        }
    }

    fn lookup(&self, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let matched = self.routes.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

/// `404 {"ok":false,"error":"Not Found"}`
pub fn not_found() -> Response {
    envelope::error_response(Status::NotFound, "Not Found")
}

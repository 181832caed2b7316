//! The request pipeline every endpoint is wrapped in.
//!
//! A [`Pipeline`] turns a raw [`Request`] into a call of an [`Endpoint`] and
//! the endpoint's [`HandlerResult`] back into an enveloped JSON [`Response`].
//! Gates run in a fixed order and the first one that fails answers the
//! request:
//!
//! 1. `OPTIONS` → `200`, empty body, `Allow` header
//! 2. method not allowed → `405`, `Allow` header
//! 3. auth required without a session → `403`
//! 4. non-`GET` body: content type must be `application/json` and the body
//!    must parse → else `400`
//! 5. the endpoint runs inside a failure boundary; errors and panics → `500`
//!
//! ```rust,no_run
//! use elective::{Api, Context, EndpointConfig, Method, Mode, Reply, Router, Sessions};
//!
//! let api = Api::new(Mode::Release, Sessions::in_memory());
//! let app = Router::new().route(
//!     "/ping",
//!     api.endpoint(EndpointConfig::new(&[Method::Get]).public(), |_: Context| async { Reply::ok("pong") }),
//! );
//! ```

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::envelope::{self, ErrorKind, Rejection};
use crate::handler::{BoxFuture, Context, Endpoint, ErasedHandler, Failure, HandlerResult, Reply};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::session::Sessions;

/// How much an internal error reveals to the caller.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// The error chain (and backtrace, when captured) goes into the response.
    Debug,
    /// `{"ok":false,"error":"Internal server error"}` and nothing more.
    #[default]
    Release,
}

/// Per-endpoint gate settings, fixed at registration.
#[derive(Clone, Debug)]
pub struct EndpointConfig {
    allowed: BTreeSet<Method>,
    requires_auth: bool,
}

impl EndpointConfig {
    /// Allows `methods` plus `OPTIONS`, and requires a session.
    /// An empty list means `GET` only.
    pub fn new(methods: &[Method]) -> Self {
        let mut allowed: BTreeSet<Method> = methods.iter().copied().collect();
        if allowed.is_empty() {
            allowed.insert(Method::Get);
        }
        allowed.insert(Method::Options);
        Self { allowed, requires_auth: true }
    }

    /// Lets anonymous callers through.
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    pub fn allows(&self, method: Method) -> bool {
        self.allowed.contains(&method)
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    /// `Allow` header value, e.g. `GET, OPTIONS`.
    pub fn allow_header(&self) -> String {
        self.allowed.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ")
    }
}

/// Builds pipelines that share a [`Mode`] and a session lookup.
#[derive(Clone)]
pub struct Api {
    mode: Mode,
    sessions: Sessions,
}

impl Api {
    pub fn new(mode: Mode, sessions: Sessions) -> Self {
        Self { mode, sessions }
    }

    pub fn endpoint(&self, config: EndpointConfig, endpoint: impl Endpoint) -> Pipeline {
        Pipeline::new(config, self.mode, self.sessions.clone(), endpoint)
    }
}

/// One endpoint wrapped in the gates. Cheap to clone.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

struct Inner {
    config: EndpointConfig,
    allow: String,
    mode: Mode,
    sessions: Sessions,
    endpoint: Box<dyn Endpoint>,
}

impl Pipeline {
    pub fn new(config: EndpointConfig, mode: Mode, sessions: Sessions, endpoint: impl Endpoint) -> Self {
        let allow = config.allow_header();
        Self {
            inner: Arc::new(Inner { config, allow, mode, sessions, endpoint: Box::new(endpoint) }),
        }
    }

    /// Runs one request through the gates and the endpoint.
    pub async fn handle(&self, req: Request) -> Response {
        let inner = &*self.inner;
        let method = req.method().parse::<Method>().ok();

        if method == Some(Method::Options) {
            return Response::builder().header("allow", &inner.allow).no_body();
        }

        let Some(method) = method.filter(|m| inner.config.allows(*m)) else {
            let mut res = self.reject(&req, Rejection::MethodNotAllowed);
            res.push_header("allow", inner.allow.as_str());
            return res;
        };

        let principal = inner.sessions.current_principal(&req);
        if inner.config.requires_auth && principal.is_none() {
            return self.reject(&req, Rejection::InvalidSession);
        }

        let body = match parse_body(method, &req) {
            Ok(body) => body,
            Err(rejection) => return self.reject(&req, rejection),
        };

        let session = inner.sessions.handle(&req);
        let path = req.path().to_owned();
        let ctx = Context { request: req, method, body, principal, session: session.clone() };

        let outcome = AssertUnwindSafe(async { inner.endpoint.call(ctx).await })
            .catch_unwind()
            .await;
        let mut res = match outcome {
            Ok(result) => self.finish(method, &path, result),
            Err(panic) => {
                let detail = panic_message(&*panic);
                error!(%method, %path, kind = ErrorKind::Internal.as_str(), %detail, "endpoint panicked");
                Rejection::Internal(detail).into_response(inner.mode)
            }
        };

        if let Some(cookie) = session.take_set_cookie() {
            res.push_header("set-cookie", cookie);
        }
        res
    }

    fn finish(&self, method: Method, path: &str, result: HandlerResult) -> Response {
        let reply = match result {
            Ok(reply) => reply,
            Err(err) => match err.downcast::<Failure>() {
                Ok(failure) => Reply::Failure(failure),
                Err(err) => {
                    error!(%method, %path, kind = ErrorKind::Internal.as_str(), error = %err, "endpoint failed");
                    return Rejection::Internal(format!("{err:?}")).into_response(self.inner.mode);
                }
            },
        };

        match reply {
            Reply::Success(data) => {
                debug!(%method, %path, status = 200, "ok");
                envelope::data_response(&data)
            }
            Reply::Failure(Failure { status, message }) => {
                warn!(%method, %path, status, kind = ErrorKind::Business.as_str(), error = %message, "rejected");
                envelope::error_response(status, &message)
            }
        }
    }

    fn reject(&self, req: &Request, rejection: Rejection) -> Response {
        warn!(
            method = req.method(),
            path = req.path(),
            status = u16::from(rejection.status()),
            kind = rejection.kind().as_str(),
            error = %rejection,
            "rejected",
        );
        rejection.into_response(self.inner.mode)
    }
}

impl ErasedHandler for Pipeline {
    fn call(&self, req: Request) -> BoxFuture {
        let this = self.clone();
        Box::pin(async move { this.handle(req).await })
    }
}

/// `Ok(None)` when there is nothing to parse: a `GET`, an empty body, or no
/// declared content type.
fn parse_body(method: Method, req: &Request) -> Result<Option<Value>, Rejection> {
    let content_type = req.content_type();
    if method == Method::Get || content_type.is_empty() || req.body().is_empty() {
        return Ok(None);
    }
    if content_type != "application/json" {
        return Err(Rejection::UnsupportedContentType(content_type.to_owned()));
    }
    Ok(Some(serde_json::from_slice(req.body())?))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_owned()
    }
}

//! The endpoint contract and the type erasure behind the router.
//!
//! Business logic is an [`Endpoint`]: `async fn(Context) -> HandlerResult`.
//! An endpoint never sees a request the pipeline rejected, and never builds
//! a response itself.
//!
//! The router stores every route the same way:
//!
//! ```text
//! api.endpoint(config, list_courses)               ← user writes this
//!        ↓ router.route("/listCourses", pipeline)
//! Arc::new(pipeline)                               ← heap-allocated, shared
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(req)  at request time               ← one vtable dispatch
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::session::{Principal, Session};
use crate::status::Status;

// ── Internal types ────────────────────────────────────────────────────────────

/// A heap-allocated, type-erased future.
///
/// `Send + 'static` let tokio move the future across threads safely.
#[doc(hidden)]
pub type BoxFuture<T = Response> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Internal dispatch interface the router calls.
pub(crate) trait ErasedHandler {
    fn call(&self, req: Request) -> BoxFuture;
}

/// A heap-allocated, type-erased handler shared across concurrent requests.
pub(crate) type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

// ── Endpoint contract ─────────────────────────────────────────────────────────

/// What an endpoint returns.
///
/// `Ok(Reply)` is a deliberate outcome. `Err(_)` (and a panic) is an internal
/// error: logged, and answered with `500`. An `Err` that wraps a [`Failure`],
/// as produced by `?` on the [`Context`] field helpers, counts as
/// `Ok(Reply::Failure(..))`.
pub type HandlerResult = anyhow::Result<Reply>;

/// The outcome of an endpoint.
#[derive(Debug, PartialEq)]
pub enum Reply {
    /// `200 {"ok":true,"data":value}`
    Success(Value),
    /// `status {"ok":false,"error":message}`
    Failure(Failure),
}

impl Reply {
    /// Success carrying `value` serialized to JSON.
    pub fn ok<T: Serialize + ?Sized>(value: &T) -> HandlerResult {
        Ok(Self::Success(serde_json::to_value(value)?))
    }

    /// Success with no payload: `data` is `null`.
    pub fn empty() -> HandlerResult {
        Ok(Self::Success(Value::Null))
    }

    pub fn failure(status: impl Into<u16>, message: impl Into<String>) -> Self {
        Self::Failure(Failure::new(status, message))
    }
}

impl From<Failure> for Reply {
    fn from(f: Failure) -> Self { Self::Failure(f) }
}

/// A business failure: status code and the message the caller sees.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{status} {message}")]
pub struct Failure {
    pub status: u16,
    pub message: String,
}

impl Failure {
    pub fn new(status: impl Into<u16>, message: impl Into<String>) -> Self {
        Self { status: status.into(), message: message.into() }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(Status::BadRequest, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(Status::Forbidden, message)
    }
}

/// Everything an endpoint knows about the request it is serving.
pub struct Context {
    pub(crate) request: Request,
    pub(crate) method: Method,
    pub(crate) body: Option<Value>,
    pub(crate) principal: Option<Principal>,
    pub(crate) session: Session,
}

impl Context {
    pub fn request(&self) -> &Request { &self.request }
    pub fn method(&self) -> Method { self.method }

    /// The parsed JSON body. `None` for `GET`, an empty body, or a body sent
    /// without a content type.
    pub fn body(&self) -> Option<&Value> { self.body.as_ref() }

    pub fn principal(&self) -> Option<&Principal> { self.principal.as_ref() }
    pub fn session(&self) -> &Session { &self.session }

    /// The principal of an authenticated endpoint.
    pub fn require_principal(&self) -> Result<&Principal, Failure> {
        self.principal().ok_or_else(|| Failure::forbidden("Invalid Session"))
    }

    /// Top-level body field `name`, failing with 400 when the body is not an
    /// object or lacks the field.
    pub fn field(&self, name: &str) -> Result<&Value, Failure> {
        self.body()
            .and_then(|b| b.get(name))
            .ok_or_else(|| Failure::bad_request(format!("Field \"{name}\" missing")))
    }

    pub fn field_str(&self, name: &str) -> Result<&str, Failure> {
        self.field(name)?.as_str().ok_or_else(|| wrong_type(name, "string"))
    }

    /// An array of strings, e.g. a list of ids.
    pub fn field_strings(&self, name: &str) -> Result<Vec<&str>, Failure> {
        self.field(name)?
            .as_array()
            .and_then(|items| items.iter().map(Value::as_str).collect::<Option<Vec<_>>>())
            .ok_or_else(|| wrong_type(name, "list of strings"))
    }
}

fn wrong_type(name: &str, expected: &str) -> Failure {
    Failure::bad_request(format!("Field \"{name}\" has wrong type, expected {expected}"))
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", &self.method)
            .field("path", &self.request.path())
            .field("body", &self.body)
            .field("principal", &self.principal)
            .finish_non_exhaustive()
    }
}

/// Business logic pluggable into a [`Pipeline`](crate::Pipeline).
///
/// Blanket-implemented for `Fn(Context) -> impl Future<Output = HandlerResult>`.
/// Capture shared state in a closure:
///
/// ```rust,ignore
/// let state = Arc::clone(&state);
/// move |ctx| list_courses(Arc::clone(&state), ctx)
/// ```
pub trait Endpoint: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> BoxFuture<HandlerResult>;
}

impl<F, Fut> Endpoint for F
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: Context) -> BoxFuture<HandlerResult> {
        Box::pin((self)(ctx))
    }
}

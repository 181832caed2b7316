//! # elective
//!
//! A small JSON backend for course selection.
//!
//! ## The contract
//!
//! Every endpoint is wrapped in the same [`Pipeline`]. It answers `OPTIONS`,
//! rejects methods the endpoint does not take, checks the session, parses the
//! JSON body, runs the endpoint, and writes one envelope:
//!
//! ```text
//! {"ok": true,  "data": ...}
//! {"ok": false, "error": "..."}
//! ```
//!
//! Endpoints only ever see requests that passed every gate, and never build a
//! response themselves. They return a [`Reply`]; anything else they raise
//! becomes a `500`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use elective::{Api, AppState, MemoryStore, Mode, Server, Sessions, api};
//!
//! #[tokio::main]
//! async fn main() {
//!     let state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), vec!["admin".into()]));
//!     let app = api::router(&Api::new(Mode::Release, Sessions::in_memory()), state);
//!
//!     Server::bind("127.0.0.1:8000".parse().unwrap()).serve(app).await.unwrap();
//! }
//! ```

mod envelope;
mod error;
mod handler;
mod method;
mod pipeline;
mod request;
mod response;
mod router;
mod server;
mod session;
mod status;

pub mod api;
pub mod codec;
pub mod config;
pub mod health;
pub mod logging;
pub mod store;

pub use api::AppState;
pub use config::{Config, ConfigError};
pub use envelope::{Envelope, ErrorKind, Rejection};
pub use error::Error;
pub use handler::{Context, Endpoint, Failure, HandlerResult, Reply};
pub use method::Method;
pub use pipeline::{Api, EndpointConfig, Mode, Pipeline};
pub use request::Request;
pub use response::{Response, ResponseBuilder};
pub use router::{Router, not_found};
pub use server::Server;
pub use session::{MemorySessions, Principal, Session, SessionStore, Sessions};
pub use status::Status;
pub use store::{Course, MemoryStore, Store, StoreError, Student};

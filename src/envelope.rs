//! The `{ok, data | error}` JSON envelope and the failure taxonomy.
//!
//! Every JSON response this service writes is one of
//!
//! ```text
//! {"ok": true,  "data": <any JSON, null included>}
//! {"ok": false, "error": "<message>"}
//! ```
//!
//! | Cause | Kind | Status | `error` |
//! |---|---|---|---|
//! | method not in the allow-list | protocol | 405 | `Method not allowed` |
//! | auth required, no principal | auth | 403 | `Invalid Session` |
//! | body with a non-JSON content type | protocol | 400 | `Content type "<ct>" not recognized` |
//! | body that fails to parse | protocol | 400 | `Malformed JSON request: <detail>` |
//! | handler-declared failure | business | chosen | chosen |
//! | handler error or panic | internal | 500 | `Internal server error` |

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::Mode;
use crate::response::Response;
use crate::status::Status;

/// Wire shape of every JSON response.
///
/// `data` is written whenever `ok` is true, `null` included; `error` only
/// when it is false.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self { ok: true, data: Some(data), error: None }
    }
}

impl Envelope<()> {
    pub fn error(message: impl Into<String>) -> Self {
        Self { ok: false, data: None, error: Some(message.into()) }
    }
}

/// Broad classification of a failed request, used for logging.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Wrong method, content type or JSON. Detected by the pipeline.
    Protocol,
    /// Missing or invalid session.
    Auth,
    /// A failure the handler returned on purpose.
    Business,
    /// Anything the handler did not mean to happen.
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protocol => "protocol",
            Self::Auth     => "auth",
            Self::Business => "business",
            Self::Internal => "internal",
        }
    }
}

/// A request the pipeline answers without a successful handler result.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Invalid Session")]
    InvalidSession,
    #[error("Content type \"{0}\" not recognized")]
    UnsupportedContentType(String),
    #[error("Malformed JSON request: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("Internal server error")]
    Internal(String),
}

impl Rejection {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSession => ErrorKind::Auth,
            Self::Internal(_) => ErrorKind::Internal,
            _ => ErrorKind::Protocol,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::MethodNotAllowed => Status::MethodNotAllowed,
            Self::InvalidSession => Status::Forbidden,
            Self::UnsupportedContentType(_) | Self::MalformedJson(_) => Status::BadRequest,
            Self::Internal(_) => Status::InternalServerError,
        }
    }

    /// The `error` string for the envelope. Internal detail is only
    /// exposed in [`Mode::Debug`].
    pub fn message(&self, mode: Mode) -> String {
        match (self, mode) {
            (Self::Internal(detail), Mode::Debug) => format!("Internal server error: {detail}"),
            _ => self.to_string(),
        }
    }

    pub fn into_response(self, mode: Mode) -> Response {
        error_response(self.status(), &self.message(mode))
    }
}

/// `{"ok":true,"data":...}` with status 200.
pub fn data_response(data: &serde_json::Value) -> Response {
    Response::json(encode(&Envelope::data(data)))
}

/// `{"ok":false,"error":...}` with the given status.
pub fn error_response(status: impl Into<u16>, message: &str) -> Response {
    Response::builder()
        .status(status)
        .json(encode(&Envelope::error(message)))
}

fn encode<T: Serialize>(envelope: &Envelope<T>) -> Vec<u8> {
    // Envelopes hold only strings, bools and `serde_json::Value`s, which
    // always serialize.
    serde_json::to_vec(envelope).unwrap_or_else(|_| br#"{"ok":false,"error":"Internal server error"}"#.to_vec())
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn body(res: &Response) -> Value {
        serde_json::from_slice(res.body()).unwrap()
    }

    #[test]
    fn data_envelope_keeps_null() {
        let res = data_response(&Value::Null);
        assert_eq!(res.status_code(), 200);
        assert_eq!(res.header("content-type"), Some("application/json"));
        assert_eq!(body(&res), json!({"ok": true, "data": null}));
    }

    #[test]
    fn error_envelope_has_no_data() {
        let res = error_response(418u16, "teapot");
        assert_eq!(res.status_code(), 418);
        assert_eq!(body(&res), json!({"ok": false, "error": "teapot"}));
    }

    #[test]
    fn rejection_messages() {
        assert_eq!(Rejection::MethodNotAllowed.to_string(), "Method not allowed");
        assert_eq!(Rejection::InvalidSession.to_string(), "Invalid Session");
        assert_eq!(
            Rejection::UnsupportedContentType("text/plain".into()).to_string(),
            r#"Content type "text/plain" not recognized"#,
        );
        let parse = serde_json::from_str::<Value>("not json").unwrap_err();
        assert!(Rejection::from(parse).to_string().starts_with("Malformed JSON request: "));
    }

    #[test]
    fn internal_detail_only_in_debug() {
        let rejection = Rejection::Internal("db exploded".into());
        assert_eq!(rejection.message(Mode::Release), "Internal server error");
        assert_eq!(rejection.message(Mode::Debug), "Internal server error: db exploded");
        assert_eq!(rejection.kind(), ErrorKind::Internal);
        assert_eq!(u16::from(rejection.status()), 500);
    }
}

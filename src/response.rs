//! Outgoing HTTP response type.
//!
//! Endpoints never build a [`Response`]; the pipeline does it for them from
//! a [`Reply`](crate::Reply). Only the envelope writers and the not-found
//! fallback construct one directly.

use bytes::Bytes;
use http::{HeaderName, HeaderValue, StatusCode};
use http_body_util::Full;
use tracing::warn;

use crate::status::Status;

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcut (200 OK, no custom headers needed)
///
/// ```rust
/// use elective::Response;
///
/// Response::json(br#"{"ok":true,"data":null}"#.to_vec());
/// ```
///
/// # Builder (custom status or headers)
///
/// ```rust
/// use elective::{Response, Status};
///
/// Response::builder()
///     .status(Status::MethodNotAllowed)
///     .header("allow", "GET, OPTIONS")
///     .json(br#"{"ok":false,"error":"Method not allowed"}"#.to_vec());
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) body: Vec<u8>,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) status: u16,
}

impl Response {
    /// `200 OK`, `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self {
            body,
            headers: vec![("content-type".to_owned(), "application/json".to_owned())],
            status: Status::Ok.into(),
        }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Vec::new(), status: Status::Ok.into() }
    }

    pub fn status_code(&self) -> u16 { self.status }
    pub fn body(&self) -> &[u8] { &self.body }

    /// First header called `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Appends a header after construction.
    pub fn push_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.push((name.to_owned(), value.into()));
    }

    /// Converts into the `http` type hyper writes to the wire.
    ///
    /// Headers whose name or value is not representable are dropped with a
    /// warning; an out-of-range status becomes `500`.
    pub(crate) fn into_inner(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = StatusCode::from_u16(self.status)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let headers = res.headers_mut();
        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(n), Ok(v)) => { headers.append(n, v); }
                _ => warn!(header = %name, "dropping unrepresentable response header"),
            }
        }
        res
    }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `Status::Ok` (200).
/// Terminated by [`json`](ResponseBuilder::json) or
/// [`no_body`](ResponseBuilder::no_body).
pub struct ResponseBuilder {
    headers: Vec<(String, String)>,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: impl Into<u16>) -> Self {
        self.status = code.into();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_owned(), value.to_owned()));
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        let mut headers = vec![("content-type".to_owned(), "application/json".to_owned())];
        headers.extend(self.headers);
        Response { body, headers, status: self.status }
    }

    /// Terminate with no body (e.g. an `OPTIONS` answer).
    pub fn no_body(self) -> Response {
        Response { body: Vec::new(), headers: self.headers, status: self.status }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_puts_content_type_first() {
        let res = Response::builder()
            .status(Status::MethodNotAllowed)
            .header("allow", "GET, OPTIONS")
            .json(b"{}".to_vec());
        assert_eq!(res.status_code(), 405);
        assert_eq!(res.headers[0].0, "content-type");
        assert_eq!(res.header("Allow"), Some("GET, OPTIONS"));
    }

    #[test]
    fn into_inner_maps_status_and_headers() {
        let mut res = Response::builder().status(418u16).no_body();
        res.push_header("allow", "GET, OPTIONS");
        res.push_header("bad header", "x");
        let inner = res.into_inner();
        assert_eq!(inner.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(inner.headers()["allow"], "GET, OPTIONS");
        assert_eq!(inner.headers().len(), 1);
    }

    #[test]
    fn out_of_range_status_becomes_500() {
        let inner = Response::builder().status(1000u16).no_body().into_inner();
        assert_eq!(inner.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

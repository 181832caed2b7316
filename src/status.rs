//! HTTP status codes as a typed enum.
//!
//! Use [`Status`] anywhere a status code is accepted:
//! `Response::builder().status()` or a handler's [`Reply::failure`].
//!
//! ```rust
//! use elective::{Reply, Response, Status};
//!
//! // status-only, no body
//! Response::builder().status(Status::NotFound).no_body();
//!
//! // business failure with a caller-chosen status
//! Reply::failure(Status::Forbidden, "Permission denied");
//!
//! // codes without a variant are plain integers
//! Reply::failure(418u16, "teapot");
//! ```
//!
//! [`Reply::failure`]: crate::Reply::failure

/// The status codes this service produces by name.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Status {
    Ok,                            // 200

    // ── 4xx Client errors ─────────────────────────────────────────────────────
    BadRequest,                    // 400
    Forbidden,                     // 403
    NotFound,                      // 404
    MethodNotAllowed,              // 405

    // ── 5xx Server errors ─────────────────────────────────────────────────────
    InternalServerError,           // 500
}

impl From<Status> for u16 {
    fn from(s: Status) -> u16 {
        match s {
            Status::Ok                  => 200,
            Status::BadRequest          => 400,
            Status::Forbidden           => 403,
            Status::NotFound            => 404,
            Status::MethodNotAllowed    => 405,
            Status::InternalServerError => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{Failure, Reply};

    #[test]
    fn named_and_bare_codes_agree() {
        assert_eq!(u16::from(Status::Forbidden), 403);
        assert_eq!(Reply::failure(Status::BadRequest, "x"), Reply::Failure(Failure::new(400u16, "x")));
        assert_eq!(Reply::failure(418u16, "teapot"), Reply::Failure(Failure::new(418u16, "teapot")));
    }
}

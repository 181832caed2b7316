//! Unified error type.

use thiserror::Error;

use crate::config::ConfigError;

/// The error type returned by elective's fallible startup and serving
/// operations.
///
/// Request-level failures (404, 405, a handler's 400) are HTTP
/// [`Response`](crate::Response) values, not `Error`s. This type surfaces
/// infrastructure failures: reading configuration, binding to a port, or
/// accepting a connection.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config: {0}")]
    Config(#[from] ConfigError),
}

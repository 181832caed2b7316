//! Service configuration, read from a TOML file.
//!
//! Every key is optional:
//!
//! ```toml
//! bind = "127.0.0.1:8000"
//! mode = "release"           # "debug" puts internal error detail in responses
//! admins = ["admin"]         # usernames allowed on /admin/*
//! session_cookie = "sessionid"
//! log = "info"               # tracing filter; RUST_LOG takes precedence
//! ```

use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::pipeline::Mode;
use crate::session::Sessions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub bind: String,
    pub mode: Mode,
    pub admins: Vec<String>,
    pub session_cookie: String,
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_owned(),
            mode: Mode::Release,
            admins: vec!["admin".to_owned()],
            session_cookie: Sessions::DEFAULT_COOKIE.to_owned(),
            log: "info".to_owned(),
        }
    }
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.session_cookie.is_empty()
            || !self.session_cookie.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::Invalid {
                field: "session_cookie",
                reason: format!("{:?} is not a valid cookie name", self.session_cookie),
            });
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.parse().map_err(|e| ConfigError::Invalid {
            field: "bind",
            reason: format!("{:?}: {e}", self.bind),
        })
    }
}

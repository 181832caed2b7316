//! Cookie sessions.
//!
//! The pipeline only asks one question of this module: who, if anyone, sent
//! this request. Login and logout handlers use the per-request [`Session`]
//! handle to start or end a session; the resulting `Set-Cookie` header is
//! attached by the pipeline once the handler returns.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use uuid::Uuid;

use crate::request::Request;

/// The authenticated caller.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Principal {
    username: String,
}

impl Principal {
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }

    pub fn username(&self) -> &str { &self.username }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

/// Token → principal storage.
pub trait SessionStore: Send + Sync + 'static {
    fn lookup(&self, token: &str) -> Option<Principal>;
    /// Starts a session and returns its token.
    fn create(&self, principal: Principal) -> String;
    fn remove(&self, token: &str);
}

/// In-process session store. Sessions die with the process.
#[derive(Default)]
pub struct MemorySessions {
    sessions: DashMap<String, Principal>,
}

impl MemorySessions {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.sessions.is_empty() }
}

impl SessionStore for MemorySessions {
    fn lookup(&self, token: &str) -> Option<Principal> {
        self.sessions.get(token).map(|p| p.value().clone())
    }

    fn create(&self, principal: Principal) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions.insert(token.clone(), principal);
        token
    }

    fn remove(&self, token: &str) {
        self.sessions.remove(token);
    }
}

/// Cookie-based session lookup shared by every pipeline.
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn SessionStore>,
    cookie: Arc<str>,
}

impl Sessions {
    pub const DEFAULT_COOKIE: &'static str = "sessionid";

    pub fn new(store: Arc<dyn SessionStore>, cookie: &str) -> Self {
        Self { store, cookie: cookie.into() }
    }

    /// Sessions held in memory under the default cookie name.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemorySessions::new()), Self::DEFAULT_COOKIE)
    }

    pub fn is_authenticated(&self, req: &Request) -> bool {
        self.current_principal(req).is_some()
    }

    pub fn current_principal(&self, req: &Request) -> Option<Principal> {
        self.store.lookup(req.cookie(&self.cookie)?)
    }

    /// A handle for one request, carrying its current token if any.
    pub fn handle(&self, req: &Request) -> Session {
        Session {
            sessions: self.clone(),
            token: req.cookie(&self.cookie).map(str::to_owned),
            set_cookie: Arc::default(),
        }
    }
}

/// Per-request session handle given to handlers through the context.
#[derive(Clone)]
pub struct Session {
    sessions: Sessions,
    token: Option<String>,
    set_cookie: Arc<Mutex<Option<String>>>,
}

impl Session {
    /// Logs `principal` in, replacing any session the request carried.
    pub fn establish(&self, principal: Principal) {
        if let Some(old) = &self.token {
            self.sessions.store.remove(old);
        }
        let token = self.sessions.store.create(principal);
        self.stage(format!(
            "{}={token}; Path=/; HttpOnly; SameSite=Lax",
            self.sessions.cookie,
        ));
    }

    /// Ends the request's session and expires the cookie.
    pub fn clear(&self) {
        if let Some(token) = &self.token {
            self.sessions.store.remove(token);
        }
        self.stage(format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
            self.sessions.cookie,
        ));
    }

    /// The `Set-Cookie` value staged by `establish` or `clear`.
    pub(crate) fn take_set_cookie(&self) -> Option<String> {
        self.set_cookie.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    fn stage(&self, cookie: String) {
        *self.set_cookie.lock().unwrap_or_else(PoisonError::into_inner) = Some(cookie);
    }
}

//! Health-check endpoints.
//!
//! | Path | Question |
//! |---|---|
//! | `/healthz` | Is the process alive? |
//! | `/readyz` | Can it serve traffic? |
//!
//! Both are public `GET` endpoints behind the same pipeline as the rest of
//! the API, so `OPTIONS` and the method gate behave as they do everywhere.

use crate::handler::{Context, HandlerResult, Reply};

/// Always `200 {"ok":true,"data":"ok"}`.
pub async fn liveness(_ctx: Context) -> HandlerResult {
    Reply::ok("ok")
}

/// `200 {"ok":true,"data":"ready"}`. The in-memory store has no warm-up.
pub async fn readiness(_ctx: Context) -> HandlerResult {
    Reply::ok("ready")
}

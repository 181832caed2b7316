//! The course-selection endpoints.
//!
//! | Route | Methods | Session |
//! |---|---|---|
//! | `/healthz`, `/readyz` | GET | no |
//! | `/login` | POST | no |
//! | `/logout` | POST | yes |
//! | `/listCourses` | GET | yes |
//! | `/selectCourses` | POST | yes |
//! | `/listSelectedCourses` | GET | yes |
//! | `/admin/uploadCoursesList` | POST | admin |
//! | `/admin/downloadSelectionData` | GET | admin |

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use anyhow::{Context as _, anyhow};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use crate::codec;
use crate::handler::{Context, Endpoint, Failure, HandlerResult, Reply};
use crate::health;
use crate::method::Method;
use crate::pipeline::{Api, EndpointConfig};
use crate::router::Router;
use crate::session::Principal;
use crate::store::{Course, Store, StoreError, Student};

/// Attempts at drawing an unused student id before giving up.
const ID_ATTEMPTS: usize = 5;

/// State shared by every endpoint.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub admins: Vec<String>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, admins: Vec<String>) -> Self {
        Self { store, admins }
    }

    pub fn is_admin(&self, principal: &Principal) -> bool {
        self.admins.iter().any(|a| a == principal.username())
    }
}

/// The full route table.
pub fn router(api: &Api, state: Arc<AppState>) -> Router {
    let public_post = || EndpointConfig::new(&[Method::Post]).public();
    let post = || EndpointConfig::new(&[Method::Post]);
    let public_get = || EndpointConfig::new(&[Method::Get]).public();
    let get = || EndpointConfig::new(&[Method::Get]);

    Router::new()
        .route("/healthz", api.endpoint(public_get(), health::liveness))
        .route("/readyz", api.endpoint(public_get(), health::readiness))
        .route("/login", api.endpoint(public_post(), with(&state, login)))
        .route("/logout", api.endpoint(post(), with(&state, logout)))
        .route("/listCourses", api.endpoint(get(), with(&state, list_courses)))
        .route("/selectCourses", api.endpoint(post(), with(&state, select_courses)))
        .route("/listSelectedCourses", api.endpoint(get(), with(&state, list_selected_courses)))
        .route("/admin/uploadCoursesList", api.endpoint(post(), with(&state, upload_courses_list)))
        .route("/admin/downloadSelectionData", api.endpoint(get(), with(&state, download_selection_data)))
}

/// Binds `state` into an endpoint.
fn with<F, Fut>(state: &Arc<AppState>, f: F) -> impl Endpoint + use<F, Fut>
where
    F: Fn(Arc<AppState>, Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    let state = Arc::clone(state);
    move |ctx: Context| f(Arc::clone(&state), ctx)
}

// ── Session ───────────────────────────────────────────────────────────────────

/// `{"username": "..."}`. Creates the student on first login.
pub async fn login(state: Arc<AppState>, ctx: Context) -> HandlerResult {
    let username = ctx.field_str("username")?.trim();
    if username.is_empty() {
        return Ok(Reply::failure(400u16, "Field \"username\" must not be empty"));
    }

    let student = find_or_create(state.store.as_ref(), username)?;
    ctx.session().establish(Principal::new(username));
    info!(username, student = %student.id, "logged in");
    Reply::empty()
}

fn find_or_create(store: &dyn Store, username: &str) -> anyhow::Result<Student> {
    if let Some(student) = store.student_for_user(username)? {
        return Ok(student);
    }
    for _ in 0..ID_ATTEMPTS {
        let student = Student::new(username);
        match store.create_student(student.clone()) {
            Ok(()) => return Ok(student),
            // Lost a race with a concurrent first login.
            Err(StoreError::Conflict { what: "user", .. }) => {
                return store
                    .student_for_user(username)?
                    .ok_or_else(|| anyhow!("student for {username} vanished after conflict"));
            }
            Err(StoreError::Conflict { .. }) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(anyhow!("no free student id after {ID_ATTEMPTS} attempts"))
}

pub async fn logout(_state: Arc<AppState>, ctx: Context) -> HandlerResult {
    if let Some(principal) = ctx.principal() {
        info!(username = principal.username(), "logged out");
    }
    ctx.session().clear();
    Reply::empty()
}

/// The caller's student record. A session whose student is gone is no
/// longer valid.
fn current_student(state: &AppState, ctx: &Context) -> anyhow::Result<Student> {
    let principal = ctx.require_principal()?;
    state
        .store
        .student_for_user(principal.username())?
        .ok_or_else(|| Failure::forbidden("Invalid Session").into())
}

fn require_admin(state: &AppState, ctx: &Context) -> Result<(), Failure> {
    if state.is_admin(ctx.require_principal()?) {
        Ok(())
    } else {
        Err(Failure::forbidden("Permission denied"))
    }
}

// ── Courses ───────────────────────────────────────────────────────────────────

pub async fn list_courses(state: Arc<AppState>, _ctx: Context) -> HandlerResult {
    Reply::ok(&state.store.courses()?)
}

/// `{"courses": ["id", ...]}`. Replaces the whole selection, or changes
/// nothing if any id is unknown.
pub async fn select_courses(state: Arc<AppState>, ctx: Context) -> HandlerResult {
    let student = current_student(&state, &ctx)?;
    let requested = ctx.field_strings("courses")?;

    for id in &requested {
        if !state.store.course_exists(id)? {
            return Ok(Reply::failure(400u16, format!("No such course with id={id}")));
        }
    }

    let ids: Vec<String> = requested
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_owned)
        .collect();
    match state.store.replace_selection(&student.id, &ids) {
        Ok(()) => {}
        // A course vanished between the check and the write.
        Err(StoreError::NotFound { what: "course", key }) => {
            return Ok(Reply::failure(400u16, format!("No such course with id={key}")));
        }
        Err(e) => return Err(e.into()),
    }
    info!(student = %student.id, count = ids.len(), "selection replaced");
    Reply::empty()
}

pub async fn list_selected_courses(state: Arc<AppState>, ctx: Context) -> HandlerResult {
    let student = current_student(&state, &ctx)?;
    let mut courses = Vec::new();
    for id in state.store.selection(&student.id)? {
        if let Some(course) = state.store.course(&id)? {
            courses.push(course);
        }
    }
    Reply::ok(&courses)
}

// ── Admin ─────────────────────────────────────────────────────────────────────

/// `{"data": "<base64 jsonl of courses>"}`. Upserts every course, or none
/// if any line is malformed or an id repeats.
pub async fn upload_courses_list(state: Arc<AppState>, ctx: Context) -> HandlerResult {
    require_admin(&state, &ctx)?;
    let courses: Vec<Course> = match codec::decode_jsonl(ctx.field_str("data")?) {
        Ok(courses) => courses,
        Err(e) => return Ok(Reply::failure(400u16, e.to_string())),
    };
    if let Some(blank) = courses.iter().position(|c| c.id.trim().is_empty()) {
        return Ok(Reply::failure(400u16, format!("Course #{} has an empty id", blank + 1)));
    }
    let mut seen = BTreeSet::new();
    if let Some(dup) = courses.iter().find(|c| !seen.insert(c.id.as_str())) {
        return Ok(Reply::failure(400u16, format!("Course id={} appears more than once", dup.id)));
    }

    let count = courses.len();
    for course in courses {
        state.store.put_course(course)?;
    }
    info!(count, "courses uploaded");
    Reply::ok(&json!({ "count": count }))
}

#[derive(Serialize)]
struct SelectionRecord {
    student: String,
    username: String,
    courses: Vec<String>,
}

/// `{"data": "<base64 jsonl>"}`, one line per student.
pub async fn download_selection_data(state: Arc<AppState>, ctx: Context) -> HandlerResult {
    require_admin(&state, &ctx)?;
    let mut records = Vec::new();
    for student in state.store.students()? {
        let courses = state.store.selection(&student.id)?;
        records.push(SelectionRecord { student: student.id, username: student.username, courses });
    }
    let data = codec::encode_jsonl(&records).context("encoding selection data")?;
    Reply::ok(&json!({ "data": data }))
}

//! End-to-end flows through the router, in-process.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use bytes::Bytes;
use serde_json::{Value, json};

use elective::{Api, AppState, Course, MemoryStore, Mode, Request, Response, Router, Sessions, Store, api, codec};

struct Harness {
    app: Router,
    store: Arc<MemoryStore>,
}

impl Harness {
    fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState::new(store.clone(), vec!["admin".to_owned()]));
        let app = api::router(&Api::new(Mode::Release, Sessions::in_memory()), state);
        Self { app, store }
    }

    fn seed(&self, ids: &[&str]) {
        for id in ids {
            self.store
                .put_course(Course {
                    id: (*id).to_owned(),
                    name: format!("Course {id}"),
                    teacher: "Prof. Li".to_owned(),
                    department: "Physics".to_owned(),
                    time: "Tue 3-4".to_owned(),
                })
                .unwrap();
        }
    }

    async fn send(&self, method: &str, path: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = http::Request::builder().method(method).uri(path);
        if let Some(c) = cookie {
            builder = builder.header("cookie", c);
        }
        let bytes = match body {
            Some(b) => {
                builder = builder.header("content-type", "application/json");
                Bytes::from(serde_json::to_vec(&b).unwrap())
            }
            None => Bytes::new(),
        };
        self.app.dispatch(Request::from(builder.body(bytes).unwrap())).await
    }

    /// Logs in and returns the `name=value` cookie pair.
    async fn login(&self, username: &str) -> String {
        let res = self.send("POST", "/login", None, Some(json!({ "username": username }))).await;
        assert_eq!(res.status_code(), 200);
        assert_eq!(body(&res), json!({"ok": true, "data": null}));
        res.header("set-cookie").unwrap().split(';').next().unwrap().to_owned()
    }
}

fn body(res: &Response) -> Value {
    serde_json::from_slice(res.body()).unwrap()
}

#[tokio::test]
async fn login_creates_one_student_per_username() {
    let h = Harness::new();
    h.login("alice").await;
    let student = h.store.student_for_user("alice").unwrap().unwrap();
    assert_eq!(student.id.len(), 10);

    h.login("alice").await;
    assert_eq!(h.store.students().unwrap(), vec![student]);
}

#[tokio::test]
async fn login_validates_username() {
    let h = Harness::new();
    let res = h.send("POST", "/login", None, Some(json!({}))).await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(body(&res)["error"], "Field \"username\" missing");

    let res = h.send("POST", "/login", None, Some(json!({"username": ["alice"]}))).await;
    assert_eq!(res.status_code(), 400);

    let res = h.send("POST", "/login", None, Some(json!({"username": "  "}))).await;
    assert_eq!(res.status_code(), 400);
    assert!(h.store.students().unwrap().is_empty());
}

#[tokio::test]
async fn endpoints_require_a_session() {
    let h = Harness::new();
    for (method, path) in [
        ("POST", "/logout"),
        ("GET", "/listCourses"),
        ("POST", "/selectCourses"),
        ("GET", "/listSelectedCourses"),
        ("POST", "/admin/uploadCoursesList"),
        ("GET", "/admin/downloadSelectionData"),
    ] {
        let res = h.send(method, path, Some("sessionid=forged"), None).await;
        assert_eq!(res.status_code(), 403, "{method} {path}");
        assert_eq!(body(&res), json!({"ok": false, "error": "Invalid Session"}));
    }
}

#[tokio::test]
async fn select_then_list() {
    let h = Harness::new();
    h.seed(&["PKU001", "PKU002", "PKU003"]);
    let cookie = h.login("bob").await;

    let res = h.send("GET", "/listCourses", Some(&cookie), None).await;
    let ids: Vec<_> = body(&res)["data"].as_array().unwrap().iter().map(|c| c["id"].clone()).collect();
    assert_eq!(ids, [json!("PKU001"), json!("PKU002"), json!("PKU003")]);

    let res = h
        .send("POST", "/selectCourses", Some(&cookie), Some(json!({"courses": ["PKU003", "PKU001", "PKU003"]})))
        .await;
    assert_eq!(body(&res), json!({"ok": true, "data": null}));

    let res = h.send("GET", "/listSelectedCourses", Some(&cookie), None).await;
    let selected = body(&res)["data"].clone();
    assert_eq!(selected.as_array().unwrap().len(), 2);
    assert_eq!(selected[0]["id"], "PKU001");
    assert_eq!(selected[1]["teacher"], "Prof. Li");
}

#[tokio::test]
async fn unknown_course_rejects_without_partial_write() {
    let h = Harness::new();
    h.seed(&["PKU001", "PKU002"]);
    let cookie = h.login("carol").await;
    h.send("POST", "/selectCourses", Some(&cookie), Some(json!({"courses": ["PKU002"]}))).await;

    let res = h
        .send("POST", "/selectCourses", Some(&cookie), Some(json!({"courses": ["PKU001", "NOPE"]})))
        .await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(body(&res), json!({"ok": false, "error": "No such course with id=NOPE"}));

    let student = h.store.student_for_user("carol").unwrap().unwrap();
    assert_eq!(h.store.selection(&student.id).unwrap(), ["PKU002"]);
}

#[tokio::test]
async fn select_courses_checks_body_shape() {
    let h = Harness::new();
    let cookie = h.login("dave").await;
    let res = h.send("POST", "/selectCourses", Some(&cookie), Some(json!({"courses": "PKU001"}))).await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(body(&res)["error"], "Field \"courses\" has wrong type, expected list of strings");
}

#[tokio::test]
async fn logout_ends_the_session() {
    let h = Harness::new();
    let cookie = h.login("erin").await;
    let res = h.send("POST", "/logout", Some(&cookie), None).await;
    assert_eq!(res.status_code(), 200);
    assert!(res.header("set-cookie").unwrap().contains("Max-Age=0"));

    let res = h.send("GET", "/listCourses", Some(&cookie), None).await;
    assert_eq!(res.status_code(), 403);
}

#[tokio::test]
async fn admin_endpoints_need_an_admin() {
    let h = Harness::new();
    let cookie = h.login("frank").await;
    let res = h.send("GET", "/admin/downloadSelectionData", Some(&cookie), None).await;
    assert_eq!(res.status_code(), 403);
    assert_eq!(body(&res)["error"], "Permission denied");
}

#[tokio::test]
async fn upload_then_download() {
    let h = Harness::new();
    let admin = h.login("admin").await;

    let roster = [
        json!({"id": "PKU010", "name": "Optics", "teacher": "Wang", "department": "Physics", "time": "Mon"}),
        json!({"id": "PKU011", "name": "Algebra", "teacher": "Chen", "department": "Math", "time": "Fri"}),
    ];
    let data = codec::encode_jsonl(&roster).unwrap();
    let res = h.send("POST", "/admin/uploadCoursesList", Some(&admin), Some(json!({ "data": data }))).await;
    assert_eq!(body(&res), json!({"ok": true, "data": {"count": 2}}));
    assert_eq!(h.store.course("PKU011").unwrap().unwrap().teacher, "Chen");

    let student = h.login("grace").await;
    h.send("POST", "/selectCourses", Some(&student), Some(json!({"courses": ["PKU010"]}))).await;

    let res = h.send("GET", "/admin/downloadSelectionData", Some(&admin), None).await;
    let encoded = body(&res)["data"]["data"].as_str().unwrap().to_owned();
    let records: Vec<Value> = codec::decode_jsonl(&encoded).unwrap();
    assert_eq!(records.len(), 2);
    let grace = records.iter().find(|r| r["username"] == "grace").unwrap();
    assert_eq!(grace["courses"], json!(["PKU010"]));
    assert_eq!(grace["student"].as_str().unwrap().len(), 10);
}

#[tokio::test]
async fn upload_is_all_or_nothing() {
    let h = Harness::new();
    let admin = h.login("admin").await;
    let data = BASE64_STANDARD.encode(
        "{\"id\":\"A\",\"name\":\"n\",\"teacher\":\"t\",\"department\":\"d\",\"time\":\"x\"}\n{\"id\":\"B\"}\n",
    );
    let res = h.send("POST", "/admin/uploadCoursesList", Some(&admin), Some(json!({ "data": data }))).await;
    assert_eq!(res.status_code(), 400);
    assert!(body(&res)["error"].as_str().unwrap().starts_with("Malformed record on line 2"));
    assert!(h.store.courses().unwrap().is_empty());

    let res = h
        .send("POST", "/admin/uploadCoursesList", Some(&admin), Some(json!({"data": "%%%"})))
        .await;
    assert_eq!(res.status_code(), 400);
}

#[tokio::test]
async fn upload_rejects_repeated_ids() {
    let h = Harness::new();
    let admin = h.login("admin").await;
    let roster = [
        json!({"id": "PKU020", "name": "Optics", "teacher": "Wang", "department": "Physics", "time": "Mon"}),
        json!({"id": "PKU020", "name": "Optics II", "teacher": "Wang", "department": "Physics", "time": "Wed"}),
    ];
    let data = codec::encode_jsonl(&roster).unwrap();
    let res = h.send("POST", "/admin/uploadCoursesList", Some(&admin), Some(json!({ "data": data }))).await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(body(&res)["error"], "Course id=PKU020 appears more than once");
    assert!(h.store.courses().unwrap().is_empty());
}

#[tokio::test]
async fn gates_run_before_business_logic() {
    let h = Harness::new();

    let res = h.send("OPTIONS", "/selectCourses", None, None).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.header("allow"), Some("OPTIONS, POST"));

    // GET-only endpoint: the method gate fires before auth and body checks.
    let res = h.send("POST", "/listCourses", None, Some(json!({"a": 1}))).await;
    assert_eq!(res.status_code(), 405);
    assert_eq!(res.header("allow"), Some("GET, OPTIONS"));

    let req = http::Request::builder()
        .method("POST")
        .uri("/login")
        .header("content-type", "text/plain")
        .body(Bytes::from_static(b"username=alice"))
        .unwrap();
    let res = h.app.dispatch(Request::from(req)).await;
    assert_eq!(res.status_code(), 400);
    assert_eq!(body(&res)["error"], "Content type \"text/plain\" not recognized");
}

#[tokio::test]
async fn unknown_routes_and_health() {
    let h = Harness::new();
    let res = h.send("GET", "/listSelected", None, None).await;
    assert_eq!(res.status_code(), 404);
    assert_eq!(body(&res), json!({"ok": false, "error": "Not Found"}));

    let res = h.send("GET", "/healthz", None, None).await;
    assert_eq!(body(&res), json!({"ok": true, "data": "ok"}));
    let res = h.send("GET", "/readyz", None, None).await;
    assert_eq!(body(&res), json!({"ok": true, "data": "ready"}));
}

#[tokio::test]
async fn health_checks_go_through_the_gates() {
    let h = Harness::new();

    let res = h.send("OPTIONS", "/healthz", None, None).await;
    assert_eq!(res.status_code(), 200);
    assert_eq!(res.header("allow"), Some("GET, OPTIONS"));

    let res = h.send("POST", "/readyz", None, None).await;
    assert_eq!(res.status_code(), 405);
    assert_eq!(body(&res), json!({"ok": false, "error": "Method not allowed"}));
}

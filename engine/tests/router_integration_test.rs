//! Router-level tests for the HTTP adapter
//!
//! Requests go through the full axum router with `tower::ServiceExt::oneshot`,
//! including session cookies, multipart submission and status mapping.

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use plost_engine::api::{self, AppState};
use plost_engine::config::Config;
use plost_engine::db::Database;
use plost_engine::submission::LinkProbe;
use sdk::types::Role;
use serde_json::Value;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "plost-test-boundary";

struct StaticProbe(bool);

#[async_trait]
impl LinkProbe for StaticProbe {
    async fn is_reachable(&self, _url: &str) -> bool {
        self.0
    }
}

struct TestApp {
    _dir: TempDir,
    state: AppState,
    app: Router,
    uploads: std::path::PathBuf,
    staging: std::path::PathBuf,
}

impl TestApp {
    /// Files in the uploads and staging directories
    fn stored_files(&self) -> usize {
        [&self.uploads, &self.staging]
            .iter()
            .map(|d| std::fs::read_dir(d).map(|e| e.count()).unwrap_or(0))
            .sum()
    }
}

async fn test_app(link_up: bool) -> TestApp {
    let dir = TempDir::new().unwrap();
    let mut config = Config::with_data_dir(dir.path()).unwrap();
    config.security.memory_kib = 1024;
    config.security.iterations = 1;

    let db = Database::new(&config.database_path()).await.unwrap();
    let state = AppState::from_parts(&db, &config, Arc::new(StaticProbe(link_up))).unwrap();
    let app = api::router(state.clone());
    let staging = state.submissions.assets().staging_dir().to_path_buf();

    TestApp {
        _dir: dir,
        state,
        app,
        uploads: config.uploads_dir(),
        staging,
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

async fn json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn form_post(uri: &str, body: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

/// `name=value` part of the session cookie set by a response
fn session_cookie(response: &Response<Body>) -> String {
    let raw = response.headers()[header::SET_COOKIE].to_str().unwrap();
    raw.split(';').next().unwrap().to_string()
}

async fn register(app: &Router, email: &str) -> String {
    let body = format!("email={}&password=pw1&name=Tester", email.replace('@', "%40"));
    let response = send(app, form_post("/register", &body, None)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    session_cookie(&response)
}

fn multipart_body(fields: &[(&str, &str)], icon: Option<(&str, &str, &[u8])>) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((file_name, content_type, bytes)) = icon {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"icon\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                BOUNDARY, file_name, content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn submission(cookie: Option<&str>, body: Vec<u8>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/plugins/new")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body)).unwrap()
}

const FIELDS: &[(&str, &str)] = &[
    ("title", "FastTP"),
    ("shortdesc", "Instant teleport"),
    ("fulldesc", "# FastTP\n\n<script>x</script> **fast**"),
    ("link", "https://example.com/fasttp"),
];

async fn submit_plugin(app: &Router, cookie: &str) -> i64 {
    let response = send(app, submission(Some(cookie), multipart_body(FIELDS, None))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    json(response).await["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_register_login_and_duplicate() {
    let t = test_app(true).await;
    let cookie = register(&t.app, "a@x.com").await;
    assert!(cookie.starts_with("plost_session="));

    let duplicate = send(&t.app, form_post("/register", "email=a%40x.com&password=pw2", None)).await;
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);
    let body = json(duplicate).await;
    assert_eq!(body["code"], "already_registered");
    assert_eq!(body["form"]["email"], "a@x.com");
    assert!(body["form"].get("password").is_none());

    let login = send(&t.app, form_post("/login", "email=a%40x.com&password=pw1", None)).await;
    assert_eq!(login.status(), StatusCode::OK);
    assert_eq!(json(login).await["user"]["role"], "user");
}

#[tokio::test]
async fn test_login_failures_are_identical() {
    let t = test_app(true).await;
    register(&t.app, "a@x.com").await;

    let unknown = send(&t.app, form_post("/login", "email=ghost%40x.com&password=pw1", None)).await;
    let wrong = send(&t.app, form_post("/login", "email=a%40x.com&password=nope", None)).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

    let unknown = json(unknown).await;
    let wrong = json(wrong).await;
    assert_eq!(unknown["error"], wrong["error"]);
    assert_eq!(unknown["code"], wrong["code"]);
    assert_eq!(unknown["hint"], wrong["hint"]);
}

#[tokio::test]
async fn test_protected_routes_redirect_when_logged_out() {
    let t = test_app(true).await;

    for request in [
        get("/dashboard", None),
        get("/moderation", None),
        form_post("/moderation/1/approve", "", None),
        form_post("/account/password", "old_password=a&new_password=b", None),
        submission(None, multipart_body(FIELDS, None)),
    ] {
        let response = send(&t.app, request).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/login");
    }
}

#[tokio::test]
async fn test_login_redirect_target_answers_get() {
    let t = test_app(true).await;

    let redirect = send(&t.app, get("/dashboard", None)).await;
    let location = redirect.headers()[header::LOCATION].to_str().unwrap().to_string();

    let response = send(&t.app, get(&location, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json(response).await;
    assert_eq!(body["method"], "POST");
    assert_eq!(body["fields"][0], "email");
    assert_eq!(body["fields"][1], "password");
}

#[tokio::test]
async fn test_submission_and_visibility_flow() {
    let t = test_app(true).await;
    let author = register(&t.app, "author@x.com").await;
    let moderator = register(&t.app, "mod@x.com").await;
    t.state
        .credentials
        .set_role("mod@x.com", Role::Moderator)
        .await
        .unwrap();

    let id = submit_plugin(&t.app, &author).await;
    let uri = format!("/plugins/{}", id);

    // Pending: hidden from the public, visible to author and moderator
    let anonymous = send(&t.app, get(&uri, None)).await;
    assert_eq!(anonymous.status(), StatusCode::FORBIDDEN);
    assert_eq!(json(anonymous).await["code"], "not_available");

    let own = send(&t.app, get(&uri, Some(&author))).await;
    assert_eq!(own.status(), StatusCode::OK);
    let detail = json(own).await;
    assert_eq!(detail["status"], "pending");
    assert!(detail["html_description"]
        .as_str()
        .unwrap()
        .contains("<strong>fast</strong>"));
    assert!(!detail["html_description"].as_str().unwrap().contains("<script>"));

    // Author cannot moderate their own plugin
    let self_approve = send(&t.app, form_post(&format!("/moderation/{}/approve", id), "", Some(&author))).await;
    assert_eq!(self_approve.status(), StatusCode::FORBIDDEN);

    // Role change applies to the open session
    let queue = send(&t.app, get("/moderation", Some(&moderator))).await;
    assert_eq!(queue.status(), StatusCode::OK);
    let queue = json(queue).await;
    assert_eq!(queue[0]["id"], id);
    assert_eq!(queue[0]["author_email"], "author@x.com");

    let rejected = send(
        &t.app,
        form_post(&format!("/moderation/{}/reject", id), "reason=broken+link", Some(&moderator)),
    )
    .await;
    assert_eq!(rejected.status(), StatusCode::OK);
    assert_eq!(json(rejected).await["reject_reason"], "broken link");

    let dashboard = json(send(&t.app, get("/dashboard", Some(&author))).await).await;
    assert_eq!(dashboard["plugins"][0]["status"], "rejected");
    assert_eq!(dashboard["plugins"][0]["reject_reason"], "broken link");

    let approved = send(&t.app, form_post(&format!("/moderation/{}/approve", id), "", Some(&moderator))).await;
    assert_eq!(approved.status(), StatusCode::OK);
    assert!(json(approved).await["reject_reason"].is_null());

    let public = send(&t.app, get(&uri, None)).await;
    assert_eq!(public.status(), StatusCode::OK);

    let home = json(send(&t.app, get("/", None)).await).await;
    assert_eq!(home["plugins"][0]["id"], id);
    assert_eq!(home["plugins"][0]["author"]["email"], "author@x.com");
    assert!(home["user"].is_null());
}

#[tokio::test]
async fn test_reject_without_reason_uses_default() {
    let t = test_app(true).await;
    let author = register(&t.app, "author@x.com").await;
    let admin = register(&t.app, "admin@x.com").await;
    t.state.credentials.set_role("admin@x.com", Role::Admin).await.unwrap();

    let id = submit_plugin(&t.app, &author).await;
    let rejected = send(&t.app, form_post(&format!("/moderation/{}/reject", id), "", Some(&admin))).await;
    assert_eq!(rejected.status(), StatusCode::OK);
    assert_eq!(json(rejected).await["reject_reason"], "Rejected");
}

#[tokio::test]
async fn test_unknown_plugin_is_not_found() {
    let t = test_app(true).await;
    let admin = register(&t.app, "admin@x.com").await;
    t.state.credentials.set_role("admin@x.com", Role::Admin).await.unwrap();

    let detail = send(&t.app, get("/plugins/999", None)).await;
    assert_eq!(detail.status(), StatusCode::NOT_FOUND);

    let approve = send(&t.app, form_post("/moderation/999/approve", "", Some(&admin))).await;
    assert_eq!(approve.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_submission_errors_echo_form() {
    let t = test_app(false).await;
    let author = register(&t.app, "author@x.com").await;

    let missing = multipart_body(&[("title", "Only a title")], None);
    let response = send(&t.app, submission(Some(&author), missing)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(response).await;
    assert_eq!(body["code"], "missing_fields");
    assert_eq!(body["form"]["title"], "Only a title");

    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    let with_icon = multipart_body(FIELDS, Some(("icon.png", "image/png", &png)));
    let response = send(&t.app, submission(Some(&author), with_icon)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json(response).await["code"], "unreachable_link");

    // Nothing staged survives a rejection
    assert_eq!(t.stored_files(), 0);
}

#[tokio::test]
async fn test_oversized_body_reports_missing_fields_first() {
    let t = test_app(true).await;
    let author = register(&t.app, "author@x.com").await;

    // Past the request body limit and without a title
    let mut huge = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    huge.resize(2 * 1024 * 1024, 0);
    let body = multipart_body(&FIELDS[1..], Some(("huge.png", "image/png", &huge)));

    let response = send(&t.app, submission(Some(&author), body)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(response).await;
    assert_eq!(body["code"], "missing_fields");
    assert_eq!(t.stored_files(), 0);
}

#[tokio::test]
async fn test_icon_served_from_uploads() {
    let t = test_app(true).await;
    let author = register(&t.app, "author@x.com").await;

    let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];
    let body = multipart_body(FIELDS, Some(("icon.png", "image/png", &png)));
    let response = send(&t.app, submission(Some(&author), body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let icon = json(response).await["icon"].as_str().unwrap().to_string();
    assert!(icon.starts_with("/uploads/"));

    let served = send(&t.app, get(&icon, None)).await;
    assert_eq!(served.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(served.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], &png[..]);
}

#[tokio::test]
async fn test_invalid_icon_rejected() {
    let t = test_app(true).await;
    let author = register(&t.app, "author@x.com").await;

    let body = multipart_body(FIELDS, Some(("icon.gif", "image/gif", b"GIF89a....")));
    let response = send(&t.app, submission(Some(&author), body)).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json(response).await["code"], "invalid_asset");
    assert_eq!(t.stored_files(), 0);
}

#[tokio::test]
async fn test_empty_file_input_uses_placeholder() {
    let t = test_app(true).await;
    let author = register(&t.app, "author@x.com").await;

    let body = multipart_body(FIELDS, Some(("", "application/octet-stream", b"")));
    let response = send(&t.app, submission(Some(&author), body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert_eq!(json(response).await["icon"], "/placeholder.svg");

    let placeholder = send(&t.app, get("/placeholder.svg", None)).await;
    assert_eq!(placeholder.status(), StatusCode::OK);
    assert_eq!(placeholder.headers()[header::CONTENT_TYPE], "image/svg+xml");
}

#[tokio::test]
async fn test_change_password_and_logout() {
    let t = test_app(true).await;
    let cookie = register(&t.app, "a@x.com").await;

    let wrong = send(
        &t.app,
        form_post("/account/password", "old_password=bad&new_password=pw2", Some(&cookie)),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(wrong).await["code"], "wrong_password");

    let changed = send(
        &t.app,
        form_post("/account/password", "old_password=pw1&new_password=pw2", Some(&cookie)),
    )
    .await;
    assert_eq!(changed.status(), StatusCode::NO_CONTENT);

    let login = send(&t.app, form_post("/login", "email=a%40x.com&password=pw2", None)).await;
    assert_eq!(login.status(), StatusCode::OK);

    let logout = send(&t.app, get("/logout", Some(&cookie))).await;
    assert_eq!(logout.status(), StatusCode::SEE_OTHER);
    assert!(logout.headers()[header::SET_COOKIE]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let after = send(&t.app, get("/dashboard", Some(&cookie))).await;
    assert_eq!(after.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_bearer_token_authenticates() {
    let t = test_app(true).await;
    let response = send(&t.app, form_post("/register", "email=b%40x.com&password=pw", None)).await;
    let token = json(response).await["token"].as_str().unwrap().to_string();

    let request = Request::builder()
        .uri("/dashboard")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let dashboard = send(&t.app, request).await;
    assert_eq!(dashboard.status(), StatusCode::OK);
    assert_eq!(json(dashboard).await["user"]["email"], "b@x.com");
}

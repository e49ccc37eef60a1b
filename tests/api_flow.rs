//! End-to-end flows through the HTTP router

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use school_portal::{
    api::{create_router, AppState},
    config::Config,
    middleware::{RateLimitConfig, RateLimiter},
    notify::{OutboxNotifier, RecordingNotifier, OUTBOX_FILE},
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct Portal {
    app: Router,
    notifier: Arc<RecordingNotifier>,
}

fn config(data_dir: &Path, storage: &str) -> Config {
    let vars: HashMap<&str, String> = [
        ("STORAGE_BACKEND", storage.to_string()),
        ("DATA_DIR", data_dir.display().to_string()),
        ("BCRYPT_COST", "4".to_string()),
        ("JWT_SECRET", "integration-secret".to_string()),
    ]
    .into_iter()
    .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
}

fn portal_with(data_dir: &Path, storage: &str, login_limit: u32) -> Portal {
    let notifier = Arc::new(RecordingNotifier::new());
    let state = AppState::open(&config(data_dir, storage), notifier.clone()).unwrap();
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests: login_limit,
        window: Duration::from_secs(60),
    });
    Portal {
        app: create_router(state, limiter),
        notifier,
    }
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = call_raw(app, method, uri, token, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn call_raw(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

async fn login(app: &Router, email: &str, password: &str) -> (StatusCode, Value) {
    call(
        app,
        "POST",
        "/api/login",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await
}

async fn token_for(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = login(app, email, password).await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn bootstrap_admin(app: &Router) -> String {
    let (status, _) = call(
        app,
        "POST",
        "/api/admin/register",
        None,
        Some(json!({
            "firstName": "Grace",
            "lastName": "Hopper",
            "email": "admin@school.org",
            "password": "Admin#Pass1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    token_for(app, "admin@school.org", "Admin#Pass1").await
}

#[tokio::test]
async fn test_health_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_with(dir.path(), "memory", 10);
    let (status, body) = call(&portal.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

async fn send_raw(app: &Router, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("POST").uri("/api/login");
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/json",
        "body for {:?} is not JSON",
        body
    );
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_malformed_bodies_get_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_with(dir.path(), "memory", 100);
    let app = &portal.app;

    // Missing fields
    let (status, body) = send_raw(app, Some("application/json"), "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("email"), "{}", body);

    // Not JSON at all
    let (status, body) = send_raw(app, Some("application/json"), "not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    // Wrong content type
    let (status, body) = send_raw(app, None, r#"{"email":"a@b.c","password":"x"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // Protected routes answer the same way
    let admin = bootstrap_admin(app).await;
    let (status, body) = call(
        app,
        "POST",
        "/api/register",
        Some(&admin),
        Some(json!({ "firstName": "NoEmail" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_outbox_credentials_let_new_accounts_log_in() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "sqlite");
    let outbox = Arc::new(OutboxNotifier::new(&config.data_dir).unwrap());
    let state = AppState::open(&config, outbox).unwrap();
    let limiter = RateLimiter::new(RateLimitConfig {
        max_requests: 100,
        window: Duration::from_secs(60),
    });
    let app = &create_router(state, limiter);

    let admin = bootstrap_admin(app).await;
    let (status, body) = call(
        app,
        "POST",
        "/api/register",
        Some(&admin),
        Some(json!({
            "firstName": "Raj",
            "lastName": "Patel",
            "email": "raj@school.org",
            "role": "teacher",
            "subject": "Physics"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);

    let contents = std::fs::read_to_string(dir.path().join(OUTBOX_FILE)).unwrap();
    let entry: Value = serde_json::from_str(contents.lines().last().unwrap()).unwrap();
    assert_eq!(entry["recipient"], "raj@school.org");
    let password = entry["password"].as_str().unwrap();

    let (status, body) = login(app, "raj@school.org", password).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["user"]["isFirstLogin"], true);
}

#[tokio::test]
async fn test_student_request_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_with(dir.path(), "memory", 100);
    let app = &portal.app;

    let admin = bootstrap_admin(app).await;

    // Only one admin
    let (status, body) = call(
        app,
        "POST",
        "/api/admin/register",
        None,
        Some(json!({
            "firstName": "Second",
            "lastName": "Admin",
            "email": "other@school.org",
            "password": "Admin#Pass2"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    // Admin registers a teacher; the generated password goes out by notifier
    let (status, body) = call(
        app,
        "POST",
        "/api/register",
        Some(&admin),
        Some(json!({
            "firstName": "Raj",
            "lastName": "Patel",
            "email": "raj@school.org",
            "role": "teacher",
            "subject": "Physics"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let teacher_password = portal.notifier.last_for("raj@school.org").unwrap().password;

    let (status, body) = login(app, "raj@school.org", &teacher_password).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isFirstLogin"], true);
    assert!(body["user"].get("password").is_none());
    let teacher = body["token"].as_str().unwrap().to_string();

    // Teacher proposes Ann Lee
    let (status, body) = call(
        app,
        "POST",
        "/api/student-requests",
        Some(&teacher),
        Some(json!({
            "type": "add",
            "studentData": {
                "firstName": "Ann",
                "lastName": "Lee",
                "email": "ann@school.org",
                "rollNumber": "S100",
                "className": "9-B"
            },
            "reason": "transfer"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let request_id = body["requestId"].as_str().unwrap().to_string();

    // Role guards
    let approve_uri = format!("/api/student-requests/{}/approve", request_id);
    let (status, _) = call(app, "POST", &approve_uri, Some(&teacher), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = call(app, "POST", &approve_uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(app, "POST", "/api/student-requests", Some(&admin), Some(json!({
        "type": "delete", "studentData": { "studentId": "x" }, "reason": ""
    })))
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(app, "GET", "/api/student-requests/pending", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requests"].as_array().unwrap().len(), 1);
    assert_eq!(body["requests"][0]["teacherName"], "Raj Patel");
    assert_eq!(body["requests"][0]["status"], "pending");

    // Approve creates the student
    let (status, body) = call(
        app,
        "POST",
        &approve_uri,
        Some(&admin),
        Some(json!({ "note": "welcome" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["request"]["status"], "approved");
    assert_eq!(body["request"]["reviewerName"], "Grace Hopper");
    assert_eq!(body["request"]["provisioning"]["state"], "completed");
    let student_id = body["request"]["provisioning"]["userId"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _) = call(app, "POST", &approve_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = call(app, "GET", "/api/student-requests/pending", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["requests"].as_array().unwrap().is_empty());

    let (_, body) = call(app, "GET", "/api/student-requests/mine", Some(&teacher), None).await;
    assert_eq!(body["requests"][0]["status"], "approved");

    let (status, body) = call(app, "GET", "/api/users", Some(&teacher), None).await;
    assert_eq!(status, StatusCode::OK);
    let students: Vec<&Value> = body["users"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|u| u["role"] == "student")
        .collect();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["rollNumber"], "S100");
    assert_eq!(students[0]["className"], "9-B");

    // Student can sign in with the delivered credentials
    let student_password = portal.notifier.last_for("ann@school.org").unwrap().password;
    let student = token_for(app, "ann@school.org", &student_password).await;

    // Marks and report
    let (status, _) = call(
        app,
        "POST",
        "/api/marks",
        Some(&teacher),
        Some(json!({
            "studentId": student_id,
            "examType": "Mid Term",
            "subjects": [{ "subject": "Math", "marks": 45, "total": 50 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(
        app,
        "POST",
        "/api/marks",
        Some(&student),
        Some(json!({ "studentId": student_id, "examType": "X", "subjects": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        app,
        "GET",
        &format!("/api/marks/{}", student_id),
        Some(&student),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["marks"].as_array().unwrap().len(), 1);

    let (status, _) = call(app, "GET", "/api/marks/someone-else", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/marks/{}/download", student_id))
                .header(header::AUTHORIZATION, format!("Bearer {}", student))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/csv");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"Report_Ann_Lee.csv\""
    );
    let csv = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(csv.to_vec()).unwrap();
    assert!(csv.starts_with("Exam Type,Subject,Marks Obtained,Total Marks,Percentage,Date\n"));
    assert!(csv.contains("\"Mid Term\",\"Math\",45,50,90.00%,"));

    // Removal request deactivates the student
    let (status, body) = call(
        app,
        "POST",
        "/api/student-requests",
        Some(&teacher),
        Some(json!({
            "type": "delete",
            "studentData": { "studentId": student_id },
            "reason": "left school"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let delete_id = body["requestId"].as_str().unwrap().to_string();

    let (status, _) = call(
        app,
        "POST",
        &format!("/api/student-requests/{}/approve", delete_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = login(app, "ann@school.org", &student_password).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Account is inactive. Please contact Admin.");

    // Existing token stops working too
    let (status, _) = call(app, "GET", "/api/auth/me", Some(&student), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = call(app, "GET", "/api/student-requests", Some(&admin), None).await;
    assert_eq!(body["requests"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_reject_and_password_change() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_with(dir.path(), "memory", 100);
    let app = &portal.app;
    let admin = bootstrap_admin(app).await;

    call(
        app,
        "POST",
        "/api/register",
        Some(&admin),
        Some(json!({
            "firstName": "Mia",
            "lastName": "Wong",
            "email": "mia@school.org",
            "role": "teacher"
        })),
    )
    .await;
    let password = portal.notifier.last_for("mia@school.org").unwrap().password;
    let (_, body) = login(app, "mia@school.org", &password).await;
    let teacher = body["token"].as_str().unwrap().to_string();
    let teacher_id = body["user"]["id"].as_str().unwrap().to_string();

    let (_, body) = call(
        app,
        "POST",
        "/api/student-requests",
        Some(&teacher),
        Some(json!({
            "type": "add",
            "studentData": { "firstName": "Bo", "lastName": "Chen", "email": "bo@school.org" },
            "reason": "new admission"
        })),
    )
    .await;
    let request_id = body["requestId"].as_str().unwrap().to_string();

    let (status, body) = call(
        app,
        "POST",
        &format!("/api/student-requests/{}/reject", request_id),
        Some(&admin),
        Some(json!({ "note": "missing documents" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["request"]["status"], "rejected");
    assert_eq!(body["request"]["reviewNote"], "missing documents");
    assert!(portal.notifier.last_for("bo@school.org").is_none());

    let (status, _) = call(
        app,
        "POST",
        &format!("/api/student-requests/{}/approve", request_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Password change
    let (status, body) = call(
        app,
        "POST",
        "/api/change-password",
        Some(&teacher),
        Some(json!({
            "userId": teacher_id,
            "currentPassword": "Wrong#Pass9",
            "newPassword": "Fresh#Pass22"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Current password is incorrect");

    let (status, _) = call(
        app,
        "POST",
        "/api/change-password",
        Some(&teacher),
        Some(json!({
            "userId": teacher_id,
            "currentPassword": password,
            "newPassword": "Fresh#Pass22"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = login(app, "mia@school.org", "Fresh#Pass22").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["isFirstLogin"], false);

    let (status, body) = login(app, "nobody@school.org", "Fresh#Pass22").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "User not registered. Please contact Admin.");
}

#[tokio::test]
async fn test_failed_delivery_is_retryable_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_with(dir.path(), "memory", 100);
    let app = &portal.app;
    let admin = bootstrap_admin(app).await;

    call(
        app,
        "POST",
        "/api/register",
        Some(&admin),
        Some(json!({
            "firstName": "Raj",
            "lastName": "Patel",
            "email": "raj@school.org",
            "role": "teacher",
            "password": "Teach#Pass1"
        })),
    )
    .await;
    let teacher = token_for(app, "raj@school.org", "Teach#Pass1").await;

    let (_, body) = call(
        app,
        "POST",
        "/api/student-requests",
        Some(&teacher),
        Some(json!({
            "type": "add",
            "studentData": { "firstName": "Ann", "lastName": "Lee", "email": "ann@school.org" },
            "reason": "transfer"
        })),
    )
    .await;
    let request_id = body["requestId"].as_str().unwrap().to_string();

    portal.notifier.set_failing(true);
    let (status, body) = call(
        app,
        "POST",
        &format!("/api/student-requests/{}/approve", request_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Request approved but student registration failed"));

    let (_, body) = call(app, "GET", "/api/student-requests", Some(&admin), None).await;
    assert_eq!(body["requests"][0]["status"], "approved");
    assert_eq!(body["requests"][0]["provisioning"]["state"], "failed");

    portal.notifier.set_failing(false);
    let (status, body) = call(
        app,
        "POST",
        &format!("/api/student-requests/{}/retry", request_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["request"]["provisioning"]["state"], "completed");
    assert!(portal.notifier.last_for("ann@school.org").is_some());
}

#[tokio::test]
async fn test_login_is_rate_limited() {
    let dir = tempfile::tempdir().unwrap();
    let portal = portal_with(dir.path(), "memory", 2);
    let app = &portal.app;

    for _ in 0..2 {
        let (status, _) = login(app, "nobody@school.org", "whatever").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, body) = login(app, "nobody@school.org", "whatever").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_state_survives_restart() {
    for backend in ["json", "sqlite"] {
        let dir = tempfile::tempdir().unwrap();
        {
            let portal = portal_with(dir.path(), backend, 100);
            bootstrap_admin(&portal.app).await;
        }

        let portal = portal_with(dir.path(), backend, 100);
        let (status, body) = login(&portal.app, "admin@school.org", "Admin#Pass1").await;
        assert_eq!(status, StatusCode::OK, "{} backend: {}", backend, body);
        assert_eq!(body["user"]["role"], "admin");
    }
}

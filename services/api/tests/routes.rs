//! Black-box tests for the HTTP surface: routing, auth middleware, and
//! tenant isolation, running the real router over the in-memory store.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use api_lib::adapters::{Argon2HashService, FsBlobStore};
use api_lib::config::Config;
use api_lib::web::{build_router, state::AppState};
use skilldeck_core::memory::MemoryStore;

fn test_router() -> Router {
    let config = Config {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        database_url: "postgres://unused".to_string(),
        log_level: tracing::Level::INFO,
        base_url: "http://localhost:3000".to_string(),
        blob_root: std::env::temp_dir().join(format!("skilldeck-test-{}", Uuid::new_v4())),
        blob_secret: "test-secret".to_string(),
    };
    let state = Arc::new(AppState {
        store: Arc::new(MemoryStore::new()),
        hasher: Arc::new(Argon2HashService),
        blob: Arc::new(FsBlobStore::new(
            config.blob_root.clone(),
            config.base_url.clone(),
            config.blob_secret.clone(),
        )),
        config: Arc::new(config),
    });
    build_router(state)
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.to_string());
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, cookie, body)
}

fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: &str, uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

async fn register_company(router: &Router, name: &str, email: &str) -> String {
    let (status, cookie, _) = send(
        router,
        json_request(
            "POST",
            "/api/companies",
            None,
            json!({ "company_name": name, "email": email, "password": "secret1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    cookie.unwrap()
}

/// Creates an employee through the API and finishes their registration
/// via the invite link. Returns the employee's session cookie.
async fn onboard_employee(router: &Router, admin_cookie: &str, name: &str, email: &str) -> String {
    let (status, _, body) = send(
        router,
        json_request(
            "POST",
            "/api/users",
            Some(admin_cookie),
            json!({ "full_name": name, "email": email }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let invite_link = body["invite_link"].as_str().unwrap();
    let token = invite_link.rsplit('/').next().unwrap();

    let (status, _, _) = send(
        router,
        json_request(
            "POST",
            &format!("/api/invite/{token}"),
            None,
            json!({ "password": "secret1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, cookie, _) = send(
        router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": email, "password": "secret1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    cookie.unwrap()
}

#[tokio::test]
async fn register_returns_session_and_admin_listing_works() {
    let router = test_router();
    let cookie = register_company(&router, "ООО Чай", "a@x.ru").await;
    assert!(cookie.starts_with("session="));

    let (status, _, body) = send(&router, bare_request("GET", "/api/users", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    let users = body.as_array().unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0]["role"], "ADMIN");
}

#[tokio::test]
async fn protected_routes_reject_missing_or_bogus_sessions() {
    let router = test_router();
    for uri in ["/api/users", "/api/courses", "/api/my-courses", "/api/notifications"] {
        let (status, _, _) = send(&router, bare_request("GET", uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "no cookie on {uri}");

        let (status, _, _) =
            send(&router, bare_request("GET", uri, Some("session=not-a-session"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "bogus cookie on {uri}");
    }
}

#[tokio::test]
async fn login_failures_are_uniform() {
    let router = test_router();
    register_company(&router, "ООО Чай", "a@x.ru").await;

    let (status, _, _) = send(
        &router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "a@x.ru", "password": "wrong!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        &router,
        json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": "nobody@x.ru", "password": "secret1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn employees_cannot_manage_users_or_courses() {
    let router = test_router();
    let admin = register_company(&router, "ООО Чай", "a@x.ru").await;
    let employee = onboard_employee(&router, &admin, "Мария", "m@x.ru").await;

    let (status, _, _) = send(&router, bare_request("GET", "/api/users", Some(&employee))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, _) = send(
        &router,
        json_request(
            "POST",
            "/api/courses",
            Some(&employee),
            json!({ "title": "Onboarding" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // But the session itself is fine for employee-facing routes.
    let (status, _, _) =
        send(&router, bare_request("GET", "/api/my-courses", Some(&employee))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_invite_is_404_and_spent_invite_is_410() {
    let router = test_router();
    let admin = register_company(&router, "ООО Чай", "a@x.ru").await;

    let (status, _, _) =
        send(&router, bare_request("GET", "/api/invite/deadbeef", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, body) = send(
        &router,
        json_request(
            "POST",
            "/api/users",
            Some(&admin),
            json!({ "full_name": "Иван" }),
        ),
    )
    .await;
    let token = body["invite_link"]
        .as_str()
        .unwrap()
        .rsplit('/')
        .next()
        .unwrap()
        .to_string();

    let (status, _, _) = send(
        &router,
        json_request(
            "POST",
            &format!("/api/invite/{token}"),
            None,
            json!({ "password": "secret1" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) =
        send(&router, bare_request("GET", &format!("/api/invite/{token}"), None)).await;
    assert_eq!(status, StatusCode::GONE);
}

#[tokio::test]
async fn courses_are_invisible_across_tenants() {
    let router = test_router();
    let admin_a = register_company(&router, "ООО Чай", "a@x.ru").await;
    let admin_b = register_company(&router, "ООО Кофе", "b@x.ru").await;

    let (status, _, body) = send(
        &router,
        json_request(
            "POST",
            "/api/courses",
            Some(&admin_a),
            json!({ "title": "Security basics" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let course_id = body["id"].as_str().unwrap().to_string();

    let (status, _, _) = send(
        &router,
        bare_request("GET", &format!("/api/courses/{course_id}"), Some(&admin_b)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = send(
        &router,
        bare_request("GET", &format!("/api/courses/{course_id}"), Some(&admin_a)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn assignment_lifecycle_over_http() {
    let router = test_router();
    let admin = register_company(&router, "ООО Чай", "a@x.ru").await;
    let employee = onboard_employee(&router, &admin, "Мария", "m@x.ru").await;

    // Find the employee's id from the admin listing.
    let (_, _, body) = send(&router, bare_request("GET", "/api/users", Some(&admin))).await;
    let employee_id = body
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["role"] == "EMPLOYEE")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (_, _, body) = send(
        &router,
        json_request(
            "POST",
            "/api/courses",
            Some(&admin),
            json!({ "title": "Onboarding", "description": "Week one" }),
        ),
    )
    .await;
    let course_id = body["id"].as_str().unwrap().to_string();

    let (status, _, _) = send(
        &router,
        json_request(
            "POST",
            &format!("/api/courses/{course_id}/tasks"),
            Some(&admin),
            json!({ "title": "Read the handbook" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _, _) = send(
        &router,
        json_request(
            "PATCH",
            &format!("/api/courses/{course_id}"),
            Some(&admin),
            json!({ "is_published": true }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = send(
        &router,
        json_request(
            "POST",
            &format!("/api/courses/{course_id}/assign"),
            Some(&admin),
            json!({ "user_ids": [employee_id] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["assigned"], 1);

    let (status, _, body) =
        send(&router, bare_request("GET", "/api/my-courses", Some(&employee))).await;
    assert_eq!(status, StatusCode::OK);
    let mine = body.as_array().unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0]["status"], "ASSIGNED");
    assert_eq!(mine[0]["task_count"], 1);

    // Opening moves it to IN_PROGRESS.
    let (status, _, body) = send(
        &router,
        bare_request("GET", &format!("/api/my-courses/{course_id}"), Some(&employee)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "IN_PROGRESS");
    assert_eq!(body["tasks"].as_array().unwrap().len(), 1);

    let (status, _, _) = send(
        &router,
        bare_request(
            "POST",
            &format!("/api/my-courses/{course_id}/complete"),
            Some(&employee),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, _, body) =
        send(&router, bare_request("GET", "/api/my-courses", Some(&employee))).await;
    assert_eq!(body.as_array().unwrap()[0]["status"], "COMPLETED");

    // The assignment produced exactly one notification.
    let (status, _, body) =
        send(&router, bare_request("GET", "/api/notifications", Some(&employee))).await;
    assert_eq!(status, StatusCode::OK);
    let feed = body.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["kind"], "COURSE_ASSIGNED");
    assert_eq!(feed[0]["course_title"], "Onboarding");
}

#[tokio::test]
async fn terminated_employee_loses_their_session() {
    let router = test_router();
    let admin = register_company(&router, "ООО Чай", "a@x.ru").await;
    let employee = onboard_employee(&router, &admin, "Мария", "m@x.ru").await;

    let (_, _, body) = send(&router, bare_request("GET", "/api/users", Some(&admin))).await;
    let employee_id = body
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["role"] == "EMPLOYEE")
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();

    let (status, _, _) = send(
        &router,
        bare_request("DELETE", &format!("/api/users/{employee_id}"), Some(&admin)),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _, _) =
        send(&router, bare_request("GET", "/api/my-courses", Some(&employee))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_invalidates_the_session() {
    let router = test_router();
    let cookie = register_company(&router, "ООО Чай", "a@x.ru").await;

    let (status, _, _) =
        send(&router, bare_request("POST", "/api/auth/logout", Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&router, bare_request("GET", "/api/users", Some(&cookie))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

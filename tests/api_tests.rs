//! API integration tests, run in-process against the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use curatehub_server::{
    api, clock::SystemClock, config::AppConfig, repository::Repository, services::Services, AppState,
};

async fn test_app() -> Router {
    let config = AppConfig::default();
    let services = Services::new(Repository::in_memory(), &config, Arc::new(SystemClock));
    services
        .auth
        .ensure_default_librarian()
        .await
        .expect("seed librarian");

    api::router(AppState {
        config: Arc::new(config),
        services: Arc::new(services),
    })
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(format!("/api/v1{}", uri));
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("request");

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

/// Helper to get a bearer token for the seeded librarian
async fn get_auth_token(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "librarian", "password": "change-me" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["token"].as_str().expect("No token in response").to_string()
}

#[tokio::test]
async fn test_health_check() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_login_and_me() {
    let app = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "username": "librarian", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthorized");

    let token = get_auth_token(&app).await;
    let (status, body) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "librarian");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_routes_require_token() {
    let app = test_app().await;
    let (status, _) = send(&app, Method::GET, "/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/loans", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_circulation_flow() {
    let app = test_app().await;
    let token = get_auth_token(&app).await;
    let token = Some(token.as_str());

    let (status, body) = send(
        &app,
        Method::POST,
        "/books",
        token,
        Some(json!({
            "title": "Florante at Laura",
            "author": "Francisco Balagtas",
            "isbn": "978-3-16-148410-0",
            "category": "Fiction"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["book"]["book_id"], "BK-001");

    let (status, body) = send(
        &app,
        Method::POST,
        "/books",
        token,
        Some(json!({
            "title": "Bad",
            "author": "Nobody",
            "isbn": "12345",
            "category": "Fiction"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid ISBN format");

    for (name, email) in [("Juan Dela Cruz", "juan@example.com"), ("Ana Santos", "ana@example.com")] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/members",
            token,
            Some(json!({
                "full_name": name,
                "email": email,
                "mobile_number": "+63 917 123 4567"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(
        &app,
        Method::POST,
        "/loans",
        token,
        Some(json!({ "book_id": "BK-001", "member_id": "MEM-001", "period_days": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["loan"]["status"], "Borrowed");
    let borrow_id = body["loan"]["borrow_id"].as_i64().expect("borrow id");

    // Same book again, to another member
    let (status, body) = send(
        &app,
        Method::POST,
        "/loans",
        token,
        Some(json!({ "book_id": "BK-001", "member_id": "MEM-002" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Book is not available for borrowing");

    let (status, body) = send(&app, Method::GET, "/members/MEM-001", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["borrowed_count"], 1);

    let (status, _) = send(&app, Method::DELETE, "/books/BK-001", token, None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, Method::GET, "/loans?status=Borrowed", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(1));
    assert_eq!(body[0]["book_title"], "Florante at Laura");

    let (status, body) = send(&app, Method::POST, &format!("/loans/{}/return", borrow_id), token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["loan"]["status"], "Returned");
    assert!(body["notice"].as_str().unwrap_or_default().contains("no more borrowed books"));

    let (status, body) = send(&app, Method::GET, "/books/BK-001", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Available");

    let (status, body) = send(&app, Method::GET, "/stats/top-borrowers", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["member_id"], "MEM-001");
    assert_eq!(body[0]["total_borrowed"], 1);

    let (status, body) = send(&app, Method::GET, "/stats", token, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active_members"], 2);
    assert_eq!(body["borrowed_books"], 0);
}

#[tokio::test]
async fn test_unknown_ids() {
    let app = test_app().await;
    let token = get_auth_token(&app).await;

    let (status, body) = send(&app, Method::GET, "/books/BK-404", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Book ID not found");

    let (status, _) = send(&app, Method::POST, "/loans/99/return", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

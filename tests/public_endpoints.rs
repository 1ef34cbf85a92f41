mod common;

use std::net::{IpAddr, SocketAddr};

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
};
use axum_test::TestServer;
use common::{test_config, TestApp};
use passwordpal::config::{RateLimitConfig, RetrievalAccess};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn server() -> (TestApp, TestServer) {
    let app = TestApp::new().await;
    let server = TestServer::new(app.router()).expect("test server");
    (app, server)
}

#[tokio::test]
async fn health_is_served_at_root_and_under_api() {
    let (_app, server) = server().await;

    for path in ["/health", "/api/health"] {
        let response = server.get(path).await;
        response.assert_status_ok();
        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }
}

#[tokio::test]
async fn generator_honours_requested_classes() {
    let (_app, server) = server().await;

    let response = server
        .post("/api/passwords/generate")
        .json(&json!({ "length": 32, "uppercase": false, "symbols": false }))
        .await;
    response.assert_status_ok();

    let body: Value = response.json();
    let password = body["data"]["password"].as_str().unwrap();
    assert_eq!(password.len(), 32);
    assert!(password.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    // 32 * log2(36) is roughly 165 bits
    assert_eq!(body["data"]["strength"], "strong");
}

#[tokio::test]
async fn generator_defaults_and_rejections() {
    let (_app, server) = server().await;

    let defaults: Value = server.post("/api/passwords/generate").json(&json!({})).await.json();
    assert_eq!(defaults["data"]["password"].as_str().unwrap().chars().count(), 16);

    let too_short = server.post("/api/passwords/generate").json(&json!({ "length": 4 })).await;
    too_short.assert_status(StatusCode::BAD_REQUEST);

    let nothing_selected = server
        .post("/api/passwords/generate")
        .json(&json!({ "uppercase": false, "lowercase": false, "numbers": false, "symbols": false }))
        .await;
    nothing_selected.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = nothing_selected.json();
    assert_eq!(body["error"], "At least one character type must be selected");
}

#[tokio::test]
async fn login_attempts_are_rate_limited() {
    let mut config = test_config(RetrievalAccess::Admin);
    config.rate_limit = RateLimitConfig { login_max_requests: 2, ..RateLimitConfig::default() };
    let app = TestApp::with_config(config).await;
    let server = TestServer::new(app.router()).expect("test server");

    let attempt = || {
        server
            .post("/api/auth/login")
            .json(&json!({ "username": "ghost", "password": "Gh0st!Password" }))
    };

    attempt().await.assert_status(StatusCode::UNAUTHORIZED);
    attempt().await.assert_status(StatusCode::UNAUTHORIZED);

    let limited = attempt().await;
    limited.assert_status(StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.headers().contains_key(header::RETRY_AFTER));
    let body: Value = limited.json();
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn forged_forwarding_headers_do_not_reset_login_limit() {
    let mut config = test_config(RetrievalAccess::Admin);
    config.rate_limit = RateLimitConfig { login_max_requests: 2, ..RateLimitConfig::default() };
    let app = TestApp::with_config(config).await;

    let mut statuses = Vec::new();
    for i in 0..6 {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .header("x-forwarded-for", format!("10.0.0.{}", i))
            .header("x-real-ip", format!("10.0.1.{}", i))
            .body(Body::from(
                json!({ "username": "ghost", "password": "Gh0st!Password" }).to_string(),
            ))
            .unwrap();
        statuses.push(app.router().oneshot(request).await.unwrap().status());
    }

    assert_eq!(&statuses[..2], &[StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED]);
    assert!(statuses[2..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS), "{:?}", statuses);
}

#[tokio::test]
async fn trusted_proxy_forwards_distinct_clients() {
    let mut config = test_config(RetrievalAccess::Admin);
    config.rate_limit = RateLimitConfig { login_max_requests: 1, ..RateLimitConfig::default() };
    config.server.trusted_proxies = vec![IpAddr::from([127, 0, 0, 1])];
    let app = TestApp::with_config(config).await;

    let login_via_proxy = |client: &str| {
        Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header("content-type", "application/json")
            .header("x-forwarded-for", client)
            .extension(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
            .body(Body::from(
                json!({ "username": "ghost", "password": "Gh0st!Password" }).to_string(),
            ))
            .unwrap()
    };

    for client in ["203.0.113.1", "203.0.113.2"] {
        let response = app.router().oneshot(login_via_proxy(client)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", client);
    }

    let repeat = app.router().oneshot(login_via_proxy("203.0.113.1")).await.unwrap();
    assert_eq!(repeat.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let (_app, server) = server().await;
    server.get("/api/nope").await.assert_status(StatusCode::NOT_FOUND);
}

// Health, API docs, rate limiting and CORS at the router edge

mod common;

use axum::http::StatusCode;
use common::{setup_test_app, setup_test_app_with, test_config};
use referral_service::services::ShortCodeGenerator;
use serde_json::{json, Value};

#[tokio::test]
async fn test_health_check_reports_storage() {
    let app = setup_test_app().await;

    let response = app.get("/health").send().await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"]["storage"]["backend"], "memory");
}

#[tokio::test]
async fn test_openapi_document_lists_user_routes() {
    let app = setup_test_app().await;

    let response = app.get("/api/v1/docs/openapi.json").send().await;

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await;
    let paths = body["paths"].as_object().unwrap();
    for path in [
        "/api/v1/users/create",
        "/api/v1/users/token",
        "/api/v1/users/new_referral_code",
        "/api/v1/users/deactivate_referral_code",
        "/api/v1/users/search_referral_code",
        "/api/v1/users/search_referred/{referrer_id}",
    ] {
        assert!(paths.contains_key(path), "missing {}", path);
    }
}

#[tokio::test]
async fn test_openapi_document_hidden_when_disabled() {
    let mut config = test_config();
    config.features.enable_swagger_ui = false;
    let app = setup_test_app_with(config, ShortCodeGenerator::default());

    let response = app.get("/api/v1/docs/openapi.json").send().await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_rate_limit_rejects_burst_per_ip() {
    let mut config = test_config();
    config.features.enable_rate_limiting = true;
    config.security.rate_limit_per_minute = 2;
    let app = setup_test_app_with(config, ShortCodeGenerator::default());

    let lookup = || {
        app.post("/api/v1/users/search_referred/1")
            .with_ip("10.0.0.1:5000")
            .send()
    };

    assert_eq!(lookup().await.status(), StatusCode::OK);
    assert_eq!(lookup().await.status(), StatusCode::OK);

    let limited = lookup().await;
    assert_eq!(limited.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(limited.header("retry-after").is_some());

    // other clients keep their own quota
    let other = app
        .post("/api/v1/users/search_referred/1")
        .with_ip("10.0.0.2:5000")
        .send()
        .await;
    assert_eq!(other.status(), StatusCode::OK);

    // health sits outside the limited routes
    let health = app.get("/health").with_ip("10.0.0.1:5000").send().await;
    assert_eq!(health.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_cors_preflight_allows_configured_origin() {
    let app = setup_test_app().await;

    let response = app
        .options("/api/v1/users/token")
        .header("origin", "https://app.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type")
        .send()
        .await;

    assert!(response.status().is_success());
    assert_eq!(
        response.header("access-control-allow-origin").as_deref(),
        Some("*")
    );
}

#[tokio::test]
async fn test_error_body_shape() {
    let app = setup_test_app().await;

    let response = app
        .post("/api/v1/users/search_referral_code")
        .json(&json!({"email": "ghost@x.com"}))
        .send()
        .await;

    let body: Value = response.json().await;
    assert_eq!(body["status"], 400);
    assert!(body["detail"].is_string());
}

// Common test utilities and helper structs
// Shared across all test files to avoid duplication
#![allow(dead_code)]

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, Response, StatusCode},
    Router,
};
use referral_service::{
    app::{build_router, AppState},
    app_config::{
        AppConfig, DatabaseConfig, Environment, FeatureConfig, JwtConfig, ReferralConfig,
        SecurityConfig, ServerConfig, StorageBackend,
    },
    db::{create_diesel_pool, DieselDatabaseConfig},
    migrations::diesel::run_migrations,
    services::ShortCodeGenerator,
    store::{InMemoryReferralStore, PgReferralStore},
};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-characters";
pub const TEST_AUDIENCE: &str = "referral-service-test";

/// Configuration for tests: in-memory store, cheap bcrypt, no throttling
pub fn test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            bind_address: "127.0.0.1:0".to_string(),
            port: 0,
            environment: Environment::Test,
            rust_log: "warn".to_string(),
        },
        storage_backend: StorageBackend::Memory,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 1,
            min_connections: 0,
            connect_timeout: 1,
            idle_timeout: 60,
            max_lifetime: 60,
            query_timeout: 1,
        },
        jwt: JwtConfig {
            secret: TEST_SECRET.to_string(),
            access_expiry: 14400,
            audience: TEST_AUDIENCE.to_string(),
            issuer: TEST_AUDIENCE.to_string(),
        },
        security: SecurityConfig {
            bcrypt_cost: 4,
            rate_limit_per_minute: 30,
            cors_allowed_origins: vec!["*".to_string()],
        },
        referral: ReferralConfig {
            default_expiration_days: 30,
            max_code_attempts: 5,
        },
        features: FeatureConfig {
            enable_rate_limiting: false,
            enable_swagger_ui: true,
            disable_embedded_migrations: true,
        },
    }
}

/// Test application wrapper
pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub store: Arc<InMemoryReferralStore>,
}

impl TestApp {
    /// Send a POST request
    pub fn post(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "POST", uri)
    }

    /// Send a GET request
    pub fn get(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "GET", uri)
    }

    pub fn options(&self, uri: &str) -> TestRequest {
        TestRequest::new(self, "OPTIONS", uri)
    }

    /// Register a user and return the response body
    pub async fn register(&self, email: &str, password: &str, referral_code: Option<&str>) -> Value {
        let response = self
            .post("/api/v1/users/create")
            .json(&json!({
                "email": email,
                "password": password,
                "referral_code": referral_code
            }))
            .send()
            .await;

        let status = response.status();
        if status != StatusCode::CREATED {
            panic!(
                "Expected CREATED (201) registering {}, got {}: {}",
                email,
                status,
                response.text().await
            );
        }
        response.json().await
    }

    /// Log in and return the bearer token
    pub async fn login(&self, email: &str, password: &str) -> String {
        let response = self
            .post("/api/v1/users/token")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await;

        assert_eq!(response.status(), StatusCode::OK, "login failed for {}", email);
        let body: Value = response.json().await;
        body["access_token"].as_str().unwrap().to_string()
    }
}

/// Test request builder
pub struct TestRequest<'a> {
    app: &'a TestApp,
    method: String,
    uri: String,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    ip: String,
}

impl<'a> TestRequest<'a> {
    fn new(app: &'a TestApp, method: &str, uri: &str) -> Self {
        Self {
            app,
            method: method.to_string(),
            uri: uri.to_string(),
            headers: Vec::new(),
            body: None,
            ip: "127.0.0.1:12345".to_string(),
        }
    }

    /// Add JSON body to request
    pub fn json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Some(serde_json::to_vec(body).unwrap());
        self.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        self
    }

    /// Raw body with a JSON content type, for malformed payloads
    pub fn raw_json(mut self, body: &str) -> Self {
        self.body = Some(body.as_bytes().to_vec());
        self.headers
            .push(("content-type".to_string(), "application/json".to_string()));
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn bearer(self, token: &str) -> Self {
        let value = format!("Bearer {}", token);
        self.header("authorization", &value)
    }

    /// Set a custom client address (useful for rate limiting tests)
    pub fn with_ip(mut self, ip: &str) -> Self {
        self.ip = ip.to_string();
        self
    }

    /// Send the request
    pub async fn send(self) -> TestResponse {
        let mut builder = Request::builder().method(self.method.as_str()).uri(&self.uri);
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let mut request = builder
            .body(self.body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        request
            .extensions_mut()
            .insert(ConnectInfo(self.ip.parse::<SocketAddr>().unwrap()));

        let response = self.app.app.clone().oneshot(request).await.unwrap();

        TestResponse { response }
    }
}

/// Test response wrapper
pub struct TestResponse {
    response: Response<Body>,
}

impl TestResponse {
    /// Get status code
    pub fn status(&self) -> StatusCode {
        self.response.status()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Parse JSON response
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> T {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    /// Get response body as text
    pub async fn text(self) -> String {
        let body = axum::body::to_bytes(self.response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }
}

/// Setup test application backed by a fresh in-memory store
pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(test_config(), ShortCodeGenerator::default())
}

pub fn setup_test_app_with(config: AppConfig, generator: ShortCodeGenerator) -> TestApp {
    let store = Arc::new(InMemoryReferralStore::new());
    let state = AppState::with_generator(config, store.clone(), generator);
    let app = build_router(state.clone());

    TestApp { app, state, store }
}

static MIGRATED: tokio::sync::OnceCell<bool> = tokio::sync::OnceCell::const_new();

/// Postgres-backed store for tests that need real constraints and locks.
/// Returns None (and the test skips) when no database is configured or reachable.
pub async fn setup_pg_store() -> Option<Arc<PgReferralStore>> {
    dotenv::from_filename(".env.test").ok();

    let url = std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()?;

    // Tests in one binary run in parallel; migrate once per process
    let migrated = MIGRATED
        .get_or_init(|| async {
            match run_migrations(&url).await {
                Ok(_) => true,
                Err(e) => {
                    eprintln!("Skipping test: failed to migrate test database: {}", e);
                    false
                },
            }
        })
        .await;
    if !*migrated {
        return None;
    }

    let mut database = test_config().database;
    database.url = url;
    database.max_connections = 10;
    database.connect_timeout = 5;
    database.query_timeout = 10;

    let pool = match create_diesel_pool(DieselDatabaseConfig::from(&database)).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Skipping test: failed to create pool: {}", e);
            return None;
        },
    };

    Some(Arc::new(PgReferralStore::new(
        pool,
        Duration::from_secs(database.query_timeout),
    )))
}

/// Email that no other test run has used
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@x.com", prefix, uuid::Uuid::new_v4().simple())
}

/// Code value that no other test run has used
pub fn unique_code() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

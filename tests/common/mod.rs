#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;
use tradejournal::api;
use tradejournal::config::Config;
use tradejournal::db::init_db;
use tradejournal::{MockMailer, Repository};

pub const SUPERUSER_EMAIL: &str = "admin@example.com";

pub struct TestApp {
    pub app: axum::Router,
    pub repo: Arc<Repository>,
    pub mailer: Arc<MockMailer>,
    pub _temp: TempDir,
}

pub async fn setup_test_app() -> TestApp {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let config = Config {
        port: 0,
        database_path: db_path,
        jwt_secret: "integration-test-secret-0123456789".to_string(),
        access_token_ttl_secs: 300,
        refresh_token_ttl_secs: 86_400,
        mail_from: "noreply@tradejournal.local".to_string(),
        superuser_emails: vec![SUPERUSER_EMAIL.to_string()],
        argon2_memory_kib: 1024,
        argon2_iterations: 1,
    };

    let mailer = Arc::new(MockMailer::new());
    let state = api::AppState::new(repo.clone(), config, mailer.clone()).unwrap();
    let app = api::create_router(state);

    TestApp {
        app,
        repo,
        mailer,
        _temp: temp_dir,
    }
}

/// Send a request, optionally with a JSON body and a bearer token.
pub async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

pub struct LoggedIn {
    pub user_id: i64,
    pub access_token: String,
    pub refresh_token: String,
}

pub async fn register(app: &axum::Router, username: &str, email: &str, password: &str) -> StatusCode {
    let (status, _) = send(
        app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"username": username, "email": email, "password": password})),
    )
    .await;
    status
}

pub async fn login(app: &axum::Router, email: &str, password: &str) -> LoggedIn {
    let (status, body) = send(
        app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": email, "password": password})),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    LoggedIn {
        user_id: body["user"]["id"].as_i64().unwrap(),
        access_token: body["access_token"].as_str().unwrap().to_string(),
        refresh_token: body["refresh_token"].as_str().unwrap().to_string(),
    }
}

/// Register and log in a fresh user.
pub async fn signup(app: &axum::Router, username: &str) -> LoggedIn {
    let email = format!("{}@example.com", username);
    assert_eq!(
        register(app, username, &email, "correct horse").await,
        StatusCode::CREATED
    );
    login(app, &email, "correct horse").await
}

pub async fn place_order(
    app: &axum::Router,
    token: &str,
    symbol: &str,
    date: &str,
    quantity: i64,
    price: &str,
    order_type: &str,
) -> Value {
    let (status, body) = send(
        app,
        "POST",
        "/orders",
        Some(token),
        Some(json!({
            "symbol": symbol,
            "date": date,
            "quantity": quantity,
            "price": price,
            "order_type": order_type,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "place_order failed: {}", body);
    body
}

pub async fn close_order(
    app: &axum::Router,
    token: &str,
    order_id: i64,
    close_price: &str,
    close_date: &str,
) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/orders/{}/close", order_id),
        Some(token),
        Some(json!({"close_price": close_price, "close_date": close_date})),
    )
    .await
}

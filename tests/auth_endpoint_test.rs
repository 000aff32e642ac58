mod common;

use axum::http::StatusCode;
use common::{login, register, send, setup_test_app, signup, SUPERUSER_EMAIL};
use serde_json::json;

#[tokio::test]
async fn test_register_and_login() {
    let t = setup_test_app().await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({
            "username": "alice",
            "email": "alice@example.com",
            "password": "s3cret-pass",
            "phone_number": "+1 555 0100",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["username"], "alice");

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "s3cret-pass"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "alice@example.com");
    assert!(body["access_token"].as_str().unwrap().len() > 20);
    assert!(body["refresh_token"].as_str().unwrap().len() > 20);

    let stored = t
        .repo
        .find_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.phone_number.as_deref(), Some("+1 555 0100"));
    assert!(!stored.is_superuser);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_missing_fields() {
    let t = setup_test_app().await;
    assert_eq!(
        register(&t.app, "alice", "alice@example.com", "pw").await,
        StatusCode::CREATED
    );

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"username": "alice2", "email": "alice@example.com", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email already registered");
    assert_eq!(body["kind"], "conflict");

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"username": "alice", "email": "other@example.com", "password": "pw"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "conflict");

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/register",
        None,
        Some(json!({"username": "bob", "email": "bob@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");
}

#[tokio::test]
async fn test_login_failures() {
    let t = setup_test_app().await;
    register(&t.app, "alice", "alice@example.com", "right").await;

    let (status, _) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "nobody@example.com", "password": "right"})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "alice@example.com", "password": "wrong"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");

    let (status, _) = send(
        &t.app,
        "POST",
        "/auth/login",
        None,
        Some(json!({"email": "alice@example.com"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_protected_endpoints_require_access_token() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;

    let (status, _) = send(&t.app, "GET", "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.app, "GET", "/orders", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A refresh token is not an access token.
    let (status, _) = send(&t.app, "GET", "/orders", Some(&alice.refresh_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&t.app, "GET", "/orders", Some(&alice.access_token), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_logout_blacklists_refresh_token() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/logout",
        Some(&alice.access_token),
        Some(json!({"refresh_token": alice.refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User logged out");

    // Second logout with the same token degrades to the generic error.
    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/logout",
        Some(&alice.access_token),
        Some(json!({"refresh_token": alice.refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid token");

    let (status, _) = send(
        &t.app,
        "POST",
        "/auth/token/refresh",
        None,
        Some(json!({"refresh_token": alice.refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_rejects_malformed_and_foreign_tokens() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;
    let bob = signup(&t.app, "bob").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/logout",
        Some(&alice.access_token),
        Some(json!({"refresh_token": "not-a-token"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid token");

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/logout",
        Some(&alice.access_token),
        Some(json!({"refresh_token": bob.refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid token");
}

#[tokio::test]
async fn test_refresh_and_verify_tokens() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;

    let (status, body) = send(
        &t.app,
        "POST",
        "/auth/token/refresh",
        None,
        Some(json!({"refresh_token": alice.refresh_token})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["access_token"].as_str().unwrap().to_string();

    let (status, _) = send(&t.app, "GET", "/users/me", Some(&fresh), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &t.app,
        "POST",
        "/auth/token/refresh",
        None,
        Some(json!({"refresh_token": alice.access_token})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &t.app,
        "POST",
        "/auth/token/verify",
        None,
        Some(json!({"token": fresh})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &t.app,
        "POST",
        "/auth/token/verify",
        None,
        Some(json!({"token": "x.y.z"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_deleted_users_token_is_rejected() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;

    let (status, _) = send(
        &t.app,
        "DELETE",
        &format!("/users/{}", alice.user_id),
        Some(&alice.access_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&t.app, "GET", "/users/me", Some(&alice.access_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_superuser_email_grants_superuser() {
    let t = setup_test_app().await;
    register(&t.app, "admin", SUPERUSER_EMAIL, "pw").await;
    let admin = login(&t.app, SUPERUSER_EMAIL, "pw").await;

    let user = t.repo.find_user_by_id(admin.user_id).await.unwrap().unwrap();
    assert!(user.is_superuser);
}

#[tokio::test]
async fn test_health_and_ready() {
    let t = setup_test_app().await;
    let (status, body) = send(&t.app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = send(&t.app, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

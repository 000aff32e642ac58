mod common;

use axum::http::StatusCode;
use common::{close_order, login, place_order, register, send, setup_test_app, signup, SUPERUSER_EMAIL};
use serde_json::json;

#[tokio::test]
async fn test_fresh_user_has_zero_stats() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;

    let (status, me) = send(&t.app, "GET", "/users/me", Some(&alice.access_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["total_no_of_orders"], 0);
    assert_eq!(me["win_rate"], 0.0);
    assert_eq!(me["profit_factor"], 0.0);
    assert_eq!(me["average_profit_loss"], 0.0);
    assert_eq!(me["average_holding_duration"], 0.0);
    assert_eq!(me["total_deposits"], 0.0);
}

#[tokio::test]
async fn test_stats_reflect_trades_orders_and_deposits() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;
    let token = alice.access_token.as_str();

    for amount in ["100.00", "50.00"] {
        let (status, _) = send(&t.app, "POST", "/deposits", Some(token), Some(json!({"amount": amount}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let winner = place_order(&t.app, token, "AAPL", "2024-01-01", 10, "100.00", "buy").await;
    let loser = place_order(&t.app, token, "MSFT", "2024-01-01", 5, "40.00", "buy").await;
    place_order(&t.app, token, "NVDA", "2024-01-01", 1, "10.00", "buy").await;

    let (status, _) = close_order(&t.app, token, winner["id"].as_i64().unwrap(), "120.00", "2024-01-05").await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = close_order(&t.app, token, loser["id"].as_i64().unwrap(), "30.00", "2024-01-03").await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, me) = send(&t.app, "GET", "/users/me", Some(token), None).await;
    assert_eq!(me["no_of_open_orders"], 1);
    assert_eq!(me["no_of_closed_orders"], 2);
    assert_eq!(me["total_no_of_orders"], 3);
    assert_eq!(me["win_rate"], 50.0);
    assert_eq!(me["profit_factor"], 4.0);
    assert_eq!(me["average_profit_loss"], 75.0);
    assert_eq!(me["average_holding_duration"], 3.0);
    assert_eq!(me["total_deposits"], 150.0);
}

#[tokio::test]
async fn test_all_winning_trades_have_zero_profit_factor() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;
    let order = place_order(&t.app, &alice.access_token, "AAPL", "2024-01-01", 1, "10.00", "buy").await;
    close_order(&t.app, &alice.access_token, order["id"].as_i64().unwrap(), "15.00", "2024-01-02").await;

    let (_, me) = send(&t.app, "GET", "/users/me", Some(&alice.access_token), None).await;
    assert_eq!(me["win_rate"], 100.0);
    assert_eq!(me["profit_factor"], 0.0);
}

#[tokio::test]
async fn test_user_listing_and_profile_access() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;
    let bob = signup(&t.app, "bob").await;

    let (_, users) = send(&t.app, "GET", "/users", Some(&alice.access_token), None).await;
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert_eq!(users[0]["id"], alice.user_id);

    let (status, _) = send(&t.app, "GET", &format!("/users/{}", bob.user_id), Some(&alice.access_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    register(&t.app, "admin", SUPERUSER_EMAIL, "pw").await;
    let admin = login(&t.app, SUPERUSER_EMAIL, "pw").await;
    let (_, users) = send(&t.app, "GET", "/users", Some(&admin.access_token), None).await;
    assert_eq!(users.as_array().unwrap().len(), 3);
    let (status, profile) = send(&t.app, "GET", &format!("/users/{}", bob.user_id), Some(&admin.access_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "bob");
}

#[tokio::test]
async fn test_update_user_profile() {
    let t = setup_test_app().await;
    let alice = signup(&t.app, "alice").await;
    signup(&t.app, "bob").await;
    let uri = format!("/users/{}", alice.user_id);

    let (status, profile) = send(
        &t.app,
        "PUT",
        &uri,
        Some(&alice.access_token),
        Some(json!({"phone_number": "+44 20 7946 0000"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["phone_number"], "+44 20 7946 0000");
    assert_eq!(profile["username"], "alice");

    let (status, body) = send(
        &t.app,
        "PUT",
        &uri,
        Some(&alice.access_token),
        Some(json!({"username": "bob"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "conflict");
}

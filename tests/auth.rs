//! Registration, Login and Session Boundary Tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

fn register_body(suffix: &str) -> serde_json::Value {
    json!({
        "username": format!("reg_{}", suffix),
        "email": format!("reg_{}@example.com", suffix),
        "first_name": "Reg",
        "last_name": "Istrant",
        "address": "1 Main St",
        "city": "Novi Sad",
        "country": "Serbia",
        "phone_number": "+381000000",
        "password": "longenoughpassword"
    })
}

#[tokio::test]
async fn register_creates_unblocked_user() {
    let app = app().await;

    let resp = app
        .post_json("/api/auth/register", register_body("ok"), None)
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["username"].as_str().unwrap(), "reg_ok");
    assert_eq!(body["role"].as_str().unwrap(), "user");
    assert_eq!(body["is_blocked"].as_bool().unwrap(), false);
    assert_eq!(body["rejected_posts_count"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn register_duplicate_username() {
    let app = app().await;

    let resp = app
        .post_json("/api/auth/register", register_body("dup"), None)
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let mut body = register_body("dup");
    body["email"] = json!("other_dup@example.com");
    let resp = app.post_json("/api/auth/register", body, None).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "Username already taken");
}

#[tokio::test]
async fn register_missing_fields() {
    let app = app().await;

    let resp = app
        .post_json(
            "/api/auth/register",
            json!({
                "username": "incomplete",
                "email": "",
                "first_name": "A",
                "last_name": "B",
                "phone_number": "+1",
                "password": "longenoughpassword"
            }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "email is required");
}

#[tokio::test]
async fn register_short_password() {
    let app = app().await;

    let mut body = register_body("shortpw");
    body["password"] = json!("short");
    let resp = app.post_json("/api/auth/register", body, None).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_and_fetch_session() {
    let app = app().await;
    let user = app.create_user("auth_login").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "username": user.username, "password": common::DEFAULT_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let access_token = resp.json()["access_token"].as_str().unwrap().to_string();

    let resp = app.get("/api/auth/session", Some(&access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["id"].as_str().unwrap(), user.id.to_string());
}

#[tokio::test]
async fn login_wrong_password() {
    let app = app().await;
    let user = app.create_user("auth_wrongpw").await;

    let resp = app
        .post_json(
            "/api/auth/login",
            json!({ "username": user.username, "password": "not-the-password" }),
            None,
        )
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
    assert_eq!(resp.error_message(), "invalid username or password");
}

#[tokio::test]
async fn session_without_token() {
    let app = app().await;

    let resp = app.get("/api/auth/session", None).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn refresh_rotates_tokens() {
    let app = app().await;
    let user = app.create_user("auth_refresh").await;

    let resp = app
        .post_json(
            "/api/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert!(resp.json()["access_token"].is_string());

    // The consumed refresh token is revoked
    let resp = app
        .post_json(
            "/api/auth/refresh",
            json!({ "refresh_token": user.refresh_token }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn check_username_availability() {
    let app = app().await;
    let user = app.create_user("auth_check").await;

    let resp = app
        .post_json(
            "/api/auth/check-username",
            json!({ "username": user.username }),
            None,
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["available"].as_bool().unwrap(), false);

    let resp = app
        .post_json(
            "/api/auth/check-username",
            json!({ "username": "definitely_unused_name" }),
            None,
        )
        .await;
    assert_eq!(resp.json()["available"].as_bool().unwrap(), true);
}

#[tokio::test]
async fn blocked_user_is_rejected_at_the_boundary() {
    let app = app().await;
    let user = app.create_user("auth_blocked").await;

    // The token predates the block; it must stop working anyway
    app.set_blocked(user.id, true).await;

    let resp = app.get("/api/auth/session", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
    assert_eq!(resp.error_message(), "account is blocked");

    let resp = app
        .post_json(
            "/api/posts",
            json!({ "content": "still here?" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

//! User Listing, Search, Profile and Admin Tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;

#[tokio::test]
async fn list_users_excludes_self() {
    let app = app().await;
    let user_a = app.create_user("usr_list_a").await;
    let user_b = app.create_user("usr_list_b").await;

    let resp = app.get("/api/users", Some(&user_a.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);

    let ids: Vec<String> = resp
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap().to_string())
        .collect();
    assert!(!ids.contains(&user_a.id.to_string()));
    assert!(ids.contains(&user_b.id.to_string()));
}

#[tokio::test]
async fn public_listing_hides_contact_details() {
    let app = app().await;
    let user_a = app.create_user("usr_privacy_a").await;
    app.create_user("usr_privacy_b").await;

    let resp = app.get("/api/users", Some(&user_a.access_token)).await;
    let items = resp.json();
    let first = &items.as_array().unwrap()[0];
    assert!(first["email"].is_null());
    assert!(first["phone_number"].is_null());
    assert!(first["username"].is_string());
}

#[tokio::test]
async fn search_users_by_username() {
    let app = app().await;
    let viewer = app.create_user("usr_search_viewer").await;
    let target = app.create_user("usr_search_target").await;

    let resp = app
        .get(
            "/api/users/search?query=usr_search_target",
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let ids: Vec<String> = resp
        .json()
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["id"].as_str().unwrap().to_string())
        .collect();
    assert!(ids.contains(&target.id.to_string()));
}

#[tokio::test]
async fn search_requires_query() {
    let app = app().await;
    let user = app.create_user("usr_search_noq").await;

    let resp = app.get("/api/users/search", Some(&user.access_token)).await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "query parameter is required");
}

#[tokio::test]
async fn update_profile_changes_fields() {
    let app = app().await;
    let user = app.create_user("usr_update").await;

    let resp = app
        .patch_json(
            "/api/users/me",
            json!({ "city": "Belgrade", "first_name": "Updated" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["city"].as_str().unwrap(), "Belgrade");
    assert_eq!(body["first_name"].as_str().unwrap(), "Updated");
    // Username is immutable
    assert_eq!(body["username"].as_str().unwrap(), user.username);
}

#[tokio::test]
async fn update_profile_rejects_empty_names() {
    let app = app().await;
    let user = app.create_user("usr_update_empty").await;

    let resp = app
        .patch_json(
            "/api/users/me",
            json!({ "first_name": "  " }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn blocked_list_requires_admin() {
    let app = app().await;
    let user = app.create_user("usr_blocked_nonadmin").await;

    let resp = app.get("/api/users/blocked", Some(&user.access_token)).await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unblock_requires_admin() {
    let app = app().await;
    let user_a = app.create_user("usr_unblock_nonadmin").await;
    let user_b = app.create_user("usr_unblock_target").await;
    app.set_blocked(user_b.id, true).await;

    let resp = app
        .post_json(
            &format!("/api/users/{}/unblock", user_b.id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unblock_user_not_blocked() {
    let app = app().await;
    let admin = app.create_admin("usr_unblock_admin").await;
    let user = app.create_user("usr_unblock_clean").await;

    let resp = app
        .post_json(
            &format!("/api/users/{}/unblock", user.id),
            json!({}),
            Some(&admin.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found or not blocked");
}

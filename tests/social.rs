//! Social Graph Tests
//!
//! Covers the friendship request lifecycle and the symmetry of the
//! unordered-pair relation.

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// Sending requests
// ===========================================================================

#[tokio::test]
async fn send_friend_request() {
    let app = app().await;
    let user_a = app.create_user("soc_send_a").await;
    let user_b = app.create_user("soc_send_b").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    let body = resp.json();
    assert_eq!(body["status"].as_str().unwrap(), "pending");
    assert_eq!(
        body["requested_by"].as_str().unwrap(),
        user_a.id.to_string()
    );
}

#[tokio::test]
async fn send_friend_request_to_self() {
    let app = app().await;
    let user = app.create_user("soc_self").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user.id.to_string() }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        resp.error_message(),
        "cannot send a friend request to yourself"
    );
}

#[tokio::test]
async fn send_friend_request_to_unknown_user() {
    let app = app().await;
    let user = app.create_user("soc_ghost").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": Uuid::new_v4().to_string() }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_request_conflicts() {
    let app = app().await;
    let user_a = app.create_user("soc_dup_a").await;
    let user_b = app.create_user("soc_dup_b").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
    assert_eq!(resp.error_message(), "friend request already exists");
}

#[tokio::test]
async fn reverse_duplicate_request_conflicts() {
    let app = app().await;
    let user_a = app.create_user("soc_revdup_a").await;
    let user_b = app.create_user("soc_revdup_b").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    // The same unordered pair from the other side must not create a second edge
    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_a.id.to_string() }),
            Some(&user_b.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CONFLICT);
}

// ===========================================================================
// Responding to requests
// ===========================================================================

#[tokio::test]
async fn accept_makes_both_sides_friends() {
    let app = app().await;
    let user_a = app.create_user("soc_accept_a").await;
    let user_b = app.create_user("soc_accept_b").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;
    let request_id = resp.json()["id"].as_str().unwrap().to_string();

    let resp = app
        .post_json(
            &format!("/api/users/friend-requests/{}/accept", request_id),
            json!({}),
            Some(&user_b.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"].as_str().unwrap(), "accepted");

    let resp = app
        .get("/api/users/friend-statuses", Some(&user_a.access_token))
        .await;
    assert_eq!(
        resp.json()[user_b.id.to_string()].as_str().unwrap(),
        "friends"
    );

    let resp = app
        .get("/api/users/friend-statuses", Some(&user_b.access_token))
        .await;
    assert_eq!(
        resp.json()[user_a.id.to_string()].as_str().unwrap(),
        "friends"
    );
}

#[tokio::test]
async fn sender_cannot_accept_own_request() {
    let app = app().await;
    let user_a = app.create_user("soc_selfaccept_a").await;
    let user_b = app.create_user("soc_selfaccept_b").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;
    let request_id = resp.json()["id"].as_str().unwrap().to_string();

    let resp = app
        .post_json(
            &format!("/api/users/friend-requests/{}/accept", request_id),
            json!({}),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn accept_by_sender_id() {
    let app = app().await;
    let user_a = app.create_user("soc_bysender_a").await;
    let user_b = app.create_user("soc_bysender_b").await;

    app.post_json(
        "/api/users/friend-requests",
        json!({ "receiver_id": user_b.id.to_string() }),
        Some(&user_a.access_token),
    )
    .await;

    let resp = app
        .post_json(
            "/api/users/friends/accept",
            json!({ "sender_id": user_a.id.to_string() }),
            Some(&user_b.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"].as_str().unwrap(), "accepted");
}

#[tokio::test]
async fn reject_then_request_again() {
    let app = app().await;
    let user_a = app.create_user("soc_rereq_a").await;
    let user_b = app.create_user("soc_rereq_b").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;
    let request_id = resp.json()["id"].as_str().unwrap().to_string();

    let resp = app
        .post_json(
            &format!("/api/users/friend-requests/{}/reject", request_id),
            json!({}),
            Some(&user_b.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"].as_str().unwrap(), "rejected");

    // A rejected edge does not stand in the way of a fresh request
    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);
}

#[tokio::test]
async fn pending_statuses_show_direction() {
    let app = app().await;
    let user_a = app.create_user("soc_dir_a").await;
    let user_b = app.create_user("soc_dir_b").await;

    app.post_json(
        "/api/users/friend-requests",
        json!({ "receiver_id": user_b.id.to_string() }),
        Some(&user_a.access_token),
    )
    .await;

    let resp = app
        .get("/api/users/friend-statuses", Some(&user_a.access_token))
        .await;
    assert_eq!(
        resp.json()[user_b.id.to_string()].as_str().unwrap(),
        "requestSent"
    );

    let resp = app
        .get("/api/users/friend-statuses", Some(&user_b.access_token))
        .await;
    assert_eq!(
        resp.json()[user_a.id.to_string()].as_str().unwrap(),
        "requestReceived"
    );
}

#[tokio::test]
async fn incoming_requests_list_sender_profile() {
    let app = app().await;
    let user_a = app.create_user("soc_inbox_a").await;
    let user_b = app.create_user("soc_inbox_b").await;

    app.post_json(
        "/api/users/friend-requests",
        json!({ "receiver_id": user_b.id.to_string() }),
        Some(&user_a.access_token),
    )
    .await;

    let resp = app
        .get("/api/users/friend-requests", Some(&user_b.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0]["sender_id"].as_str().unwrap(),
        user_a.id.to_string()
    );
    assert_eq!(
        items[0]["sender_username"].as_str().unwrap(),
        user_a.username
    );
}

// ===========================================================================
// Removal
// ===========================================================================

#[tokio::test]
async fn remove_friendship_clears_both_orientations() {
    let app = app().await;
    let user_a = app.create_user("soc_remove_a").await;
    let user_b = app.create_user("soc_remove_b").await;

    let resp = app
        .post_json(
            "/api/users/friend-requests",
            json!({ "receiver_id": user_b.id.to_string() }),
            Some(&user_a.access_token),
        )
        .await;
    let request_id = resp.json()["id"].as_str().unwrap().to_string();
    app.post_json(
        &format!("/api/users/friend-requests/{}/accept", request_id),
        json!({}),
        Some(&user_b.access_token),
    )
    .await;

    let resp = app
        .delete(
            &format!("/api/users/friends/{}", user_b.id),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    // No edge remains in either orientation
    let resp = app
        .get("/api/users/friend-statuses", Some(&user_a.access_token))
        .await;
    assert!(resp.json()[user_b.id.to_string()].is_null());
    let resp = app
        .get("/api/users/friend-statuses", Some(&user_b.access_token))
        .await;
    assert!(resp.json()[user_a.id.to_string()].is_null());

    // Removing again reports the absence
    let resp = app
        .delete(
            &format!("/api/users/friends/{}", user_b.id),
            Some(&user_a.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn either_side_may_remove() {
    let app = app().await;
    let user_a = app.create_user("soc_remove_other_a").await;
    let user_b = app.create_user("soc_remove_other_b").await;
    app.befriend(user_a.id, user_b.id).await;

    // The side that did not initiate removes the edge
    let resp = app
        .delete(
            &format!("/api/users/friends/{}", user_a.id),
            Some(&user_b.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);
}

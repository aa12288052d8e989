//! Post CRUD, Engagement and Feed Tests

mod common;

use axum::http::StatusCode;
use common::app;
use serde_json::json;
use uuid::Uuid;

// ===========================================================================
// CRUD
// ===========================================================================

#[tokio::test]
async fn create_post_requires_content() {
    let app = app().await;
    let user = app.create_user("post_nocontent").await;

    let resp = app
        .post_json(
            "/api/posts",
            json!({ "content": "   " }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert_eq!(resp.error_message(), "content is required");
}

#[tokio::test]
async fn create_post_requires_auth() {
    let app = app().await;

    let resp = app
        .post_json("/api/posts", json!({ "content": "anon" }), None)
        .await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_my_posts_shows_all_statuses() {
    let app = app().await;
    let user = app.create_user("post_mine").await;
    let admin = app.create_admin("post_mine_admin").await;

    let first = app.create_post_for_user(user.id, "one").await;
    app.create_post_for_user(user.id, "two").await;
    app.post_json(
        &format!("/api/posts/{}/reject", first),
        json!({ "reason": "meh" }),
        Some(&admin.access_token),
    )
    .await;

    let resp = app.get("/api/posts/mine", Some(&user.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    let statuses: Vec<&str> = items
        .iter()
        .map(|p| p["status"].as_str().unwrap())
        .collect();
    assert!(statuses.contains(&"rejected"));
    assert!(statuses.contains(&"pending"));
}

#[tokio::test]
async fn update_post_wrong_user() {
    let app = app().await;
    let user_a = app.create_user("post_upd_a").await;
    let user_b = app.create_user("post_upd_b").await;
    let post_id = app.create_post_for_user(user_a.id, "mine").await;

    let resp = app
        .patch_json(
            &format!("/api/posts/{}", post_id),
            json!({ "content": "hijacked" }),
            Some(&user_b.access_token),
        )
        .await;

    // Ownership enforced — returns 404 to avoid leaking existence
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_post() {
    let app = app().await;
    let user = app.create_user("post_del").await;
    let post_id = app.create_post_for_user(user.id, "temporary").await;

    let resp = app
        .delete(&format!("/api/posts/{}", post_id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NO_CONTENT);

    let resp = app.get("/api/posts/mine", Some(&user.access_token)).await;
    assert_eq!(resp.json().as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn delete_post_wrong_user() {
    let app = app().await;
    let user_a = app.create_user("post_del_a").await;
    let user_b = app.create_user("post_del_b").await;
    let post_id = app.create_post_for_user(user_a.id, "keep out").await;

    let resp = app
        .delete(&format!("/api/posts/{}", post_id), Some(&user_b.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Likes
// ===========================================================================

#[tokio::test]
async fn toggle_like_flips_state() {
    let app = app().await;
    let user = app.create_user("post_like").await;
    let post_id = app.create_post_for_user(user.id, "likeable").await;

    let resp = app
        .post_json(
            &format!("/api/posts/{}/like", post_id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["liked"].as_bool().unwrap(), true);
    assert_eq!(resp.json()["like_count"].as_i64().unwrap(), 1);

    let resp = app
        .post_json(
            &format!("/api/posts/{}/like", post_id),
            json!({}),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["liked"].as_bool().unwrap(), false);
    assert_eq!(resp.json()["like_count"].as_i64().unwrap(), 0);
}

#[tokio::test]
async fn like_nonexistent_post() {
    let app = app().await;
    let user = app.create_user("post_like_ghost").await;

    let resp = app
        .post_json(
            &format!("/api/posts/{}/like", Uuid::new_v4()),
            json!({}),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Comments
// ===========================================================================

#[tokio::test]
async fn comment_and_list_newest_first() {
    let app = app().await;
    let user = app.create_user("post_comment").await;
    let post_id = app.create_post_for_user(user.id, "discuss").await;

    let resp = app
        .post_json(
            &format!("/api/posts/{}/comments", post_id),
            json!({ "body": "first" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .post_json(
            &format!("/api/posts/{}/comments", post_id),
            json!({ "body": "second" }),
            Some(&user.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::CREATED);

    let resp = app
        .get(&format!("/api/posts/{}/comments", post_id), Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["body"].as_str().unwrap(), "second");
    assert_eq!(items[1]["body"].as_str().unwrap(), "first");
    assert_eq!(items[0]["author_username"].as_str().unwrap(), user.username);
}

#[tokio::test]
async fn comment_requires_body() {
    let app = app().await;
    let user = app.create_user("post_comment_empty").await;
    let post_id = app.create_post_for_user(user.id, "quiet").await;

    let resp = app
        .post_json(
            &format!("/api/posts/{}/comments", post_id),
            json!({ "body": "" }),
            Some(&user.access_token),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

// ===========================================================================
// Feed
// ===========================================================================

#[tokio::test]
async fn feed_shows_approved_friend_posts_with_like_state() {
    let app = app().await;
    let viewer = app.create_user("feed_viewer").await;
    let friend = app.create_user("feed_friend").await;
    let stranger = app.create_user("feed_stranger").await;
    let admin = app.create_admin("feed_admin").await;

    app.befriend(viewer.id, friend.id).await;

    let approved_id = app.create_post_for_user(friend.id, "friend approved").await;
    let pending_id = app.create_post_for_user(friend.id, "friend pending").await;
    let stranger_id = app.create_post_for_user(stranger.id, "stranger approved").await;

    for id in [approved_id, stranger_id] {
        let resp = app
            .post_json(
                &format!("/api/posts/{}/approve", id),
                json!({}),
                Some(&admin.access_token),
            )
            .await;
        assert_eq!(resp.status, StatusCode::OK);
    }

    let resp = app
        .post_json(
            &format!("/api/posts/{}/like", approved_id),
            json!({}),
            Some(&viewer.access_token),
        )
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let resp = app.get("/api/posts/feed", Some(&viewer.access_token)).await;
    assert_eq!(resp.status, StatusCode::OK);
    let items = resp.json();
    let items = items.as_array().unwrap();

    let ids: Vec<String> = items
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect();
    assert!(ids.contains(&approved_id.to_string()));
    assert!(!ids.contains(&pending_id.to_string()));
    assert!(!ids.contains(&stranger_id.to_string()));

    let entry = items
        .iter()
        .find(|p| p["id"].as_str().unwrap() == approved_id.to_string())
        .unwrap();
    assert_eq!(entry["like_count"].as_i64().unwrap(), 1);
    assert_eq!(entry["viewer_liked"].as_bool().unwrap(), true);
    assert_eq!(entry["owner_username"].as_str().unwrap(), friend.username);
}

#[tokio::test]
async fn feed_limit_bounds() {
    let app = app().await;
    let user = app.create_user("feed_limit").await;

    let resp = app
        .get("/api/posts/feed?limit=0", Some(&user.access_token))
        .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

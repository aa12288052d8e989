use axum::{routing::delete, routing::get, routing::patch, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh", post(handlers::refresh_token))
        .route("/api/auth/revoke", post(handlers::revoke_token))
        .route("/api/auth/session", get(handlers::get_session))
        .route("/api/auth/check-username", post(handlers::check_username))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(handlers::list_users))
        .route("/api/users/search", get(handlers::search_users))
        .route("/api/users/me", patch(handlers::update_profile))
        .route("/api/users/me/avatar", post(handlers::set_avatar))
        .route(
            "/api/users/friend-requests",
            post(handlers::send_friend_request),
        )
        .route(
            "/api/users/friend-requests",
            get(handlers::list_friend_requests),
        )
        .route(
            "/api/users/friend-requests/:id/accept",
            post(handlers::accept_friend_request),
        )
        .route(
            "/api/users/friend-requests/:id/reject",
            post(handlers::reject_friend_request),
        )
        .route("/api/users/friends/accept", post(handlers::accept_friend))
        .route(
            "/api/users/friends/:friend_id",
            delete(handlers::remove_friend),
        )
        .route("/api/users/friend-statuses", get(handlers::friend_statuses))
        .route("/api/users/blocked", get(handlers::list_blocked_users))
        .route("/api/users/:id/unblock", post(handlers::unblock_user))
}

pub fn posts() -> Router<AppState> {
    Router::new()
        .route("/api/posts", post(handlers::create_post))
        .route("/api/posts/mine", get(handlers::list_my_posts))
        .route("/api/posts/feed", get(handlers::friends_feed))
        .route("/api/posts/pending", get(handlers::list_pending_posts))
        .route("/api/posts/:id", patch(handlers::update_post))
        .route("/api/posts/:id", delete(handlers::delete_post))
        .route("/api/posts/:id/approve", post(handlers::approve_post))
        .route("/api/posts/:id/reject", post(handlers::reject_post))
        .route("/api/posts/:id/like", post(handlers::toggle_like))
        .route("/api/posts/:id/comments", post(handlers::comment_post))
        .route("/api/posts/:id/comments", get(handlers::list_comments))
}

pub fn messages() -> Router<AppState> {
    Router::new()
        .route("/api/messages", post(handlers::send_message))
        .route(
            "/api/messages/conversation/:friend_id",
            get(handlers::get_conversation),
        )
}

pub fn events() -> Router<AppState> {
    Router::new().route("/api/events", get(handlers::event_stream))
}

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::convert::Infallible;
use time::OffsetDateTime;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::app::auth::{AuthService, NewUser};
use crate::app::engagement::{EngagementService, LikeToggle};
use crate::app::feed::FeedService;
use crate::app::messages::MessageService;
use crate::app::notifier::Notifier;
use crate::app::posts::{Approval, PostService, Rejection};
use crate::app::social::{FriendRequest, FriendshipService};
use crate::app::users::{ProfileUpdate, UserService};
use crate::domain::friendship::{FriendStatus, Friendship};
use crate::domain::post::{FeedPost, Post};
use crate::domain::user::{PublicUser, User};
use crate::http::{AdminUser, AppError, AuthUser};
use crate::infra::storage;
use crate::AppState;

const MAX_PASSWORD_LEN: usize = 128;
const MAX_CONTENT_LEN: usize = 5000;
const MAX_COMMENT_LEN: usize = 1000;
const MAX_MESSAGE_LEN: usize = 5000;
const DEFAULT_FEED_LIMIT: i64 = 50;

// ---------------------------------------------------------------------------
// Shared plumbing
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let db = state.db.ping().await.is_ok();
    let redis = state.cache.ping().await.is_ok();
    let status = if db && redis { "ok" } else { "degraded" };

    Json(HealthResponse { status })
}

/// One image per post or profile-photo operation, carried inline as base64.
#[derive(Deserialize)]
pub struct ImagePayload {
    pub filename: String,
    pub data: String,
}

async fn store_image(
    state: &AppState,
    owner_id: Uuid,
    prefix: &str,
    payload: ImagePayload,
) -> Result<String, AppError> {
    let ext = storage::image_extension(&payload.filename)
        .ok_or_else(|| AppError::bad_request("unsupported image type"))?;

    let data = STANDARD
        .decode(payload.data.as_bytes())
        .map_err(|_| AppError::bad_request("image data must be base64"))?;

    if data.len() as i64 > state.upload_max_bytes {
        return Err(AppError::bad_request("image exceeds the maximum size"));
    }
    if image::load_from_memory(&data).is_err() {
        return Err(AppError::bad_request("image data is not a valid image"));
    }

    state
        .storage
        .store_image(prefix, owner_id, &ext, bytes::Bytes::from(data))
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to store image");
            AppError::internal("failed to store image")
        })
}

/// Best-effort blob release, detached from the request.
fn release_image(state: &AppState, key: Option<String>) {
    let Some(key) = key else { return };
    let storage = state.storage.clone();
    tokio::spawn(async move {
        if let Err(err) = storage.delete_image(&key).await {
            tracing::warn!(error = ?err, key = %key, "failed to delete stored image");
        }
    });
}

fn with_post_url(state: &AppState, mut post: Post) -> Post {
    if let Some(key) = &post.image_key {
        post.image_url = state.storage.public_url(key);
    }
    post
}

fn with_user_url(state: &AppState, mut user: User) -> User {
    if let Some(key) = &user.avatar_key {
        user.avatar_url = state.storage.public_url(key);
    }
    user
}

fn as_public_user(state: &AppState, user: User) -> PublicUser {
    with_user_url(state, user).into()
}

fn auth_service(state: &AppState) -> AuthService {
    AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.paseto_refresh_key,
        state.access_ttl_minutes,
        state.refresh_ttl_days,
    )
}

fn post_service(state: &AppState) -> PostService {
    PostService::new(
        state.db.clone(),
        Notifier::new(state.queue.clone()),
        state.events.clone(),
    )
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone_number: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    for (value, name) in [
        (&payload.username, "username"),
        (&payload.email, "email"),
        (&payload.first_name, "first_name"),
        (&payload.last_name, "last_name"),
        (&payload.phone_number, "phone_number"),
    ] {
        if value.trim().is_empty() {
            return Err(AppError::bad_request(format!("{} is required", name)));
        }
    }
    if payload.password.trim().len() < 8 {
        return Err(AppError::bad_request("password must be at least 8 characters"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let user = service
        .register(NewUser {
            username: payload.username,
            email: payload.email,
            first_name: payload.first_name,
            last_name: payload.last_name,
            address: payload.address,
            city: payload.city,
            country: payload.country,
            phone_number: payload.phone_number,
            password: payload.password,
        })
        .await
        .map_err(|err| {
            if let Some(sqlx_err) = err.downcast_ref::<sqlx::Error>() {
                if let Some(db_err) = sqlx_err.as_database_error() {
                    if db_err.code().as_deref() == Some("23505") {
                        let constraint = db_err.constraint().unwrap_or_default();
                        if constraint.contains("users_username_key") {
                            return AppError::conflict("Username already taken");
                        }
                        if constraint.contains("users_email_key") {
                            return AppError::conflict("Email already taken");
                        }
                    }
                }
            }
            tracing::error!(error = ?err, "failed to register user");
            AppError::internal("failed to register user")
        })?;

    let notifier = Notifier::new(state.queue.clone());
    notifier.notify(
        user.email.clone(),
        "Welcome to agora".to_string(),
        format!("Your account {} has been created.", user.username),
    );

    Ok((StatusCode::CREATED, Json(with_user_url(&state, user))))
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.username.trim().is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::bad_request("username and password are required"));
    }
    if payload.password.len() > MAX_PASSWORD_LEN {
        return Err(AppError::bad_request("password must be at most 128 characters"));
    }

    let service = auth_service(&state);
    let tokens = service
        .login(&payload.username, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid username or password")),
    }
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn refresh_token(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    let tokens = service.refresh(&payload.refresh_token).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to refresh token");
        AppError::internal("failed to refresh token")
    })?;

    match tokens {
        Some(tokens) => Ok(Json(AuthTokenResponse {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
            access_expires_at: tokens.access_expires_at,
            refresh_expires_at: tokens.refresh_expires_at,
        })),
        None => Err(AppError::unauthorized("invalid refresh token")),
    }
}

#[derive(Deserialize)]
pub struct RevokeRequest {
    pub refresh_token: String,
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Json(payload): Json<RevokeRequest>,
) -> Result<StatusCode, AppError> {
    if payload.refresh_token.trim().is_empty() {
        return Err(AppError::bad_request("refresh_token is required"));
    }

    let service = auth_service(&state);
    service
        .revoke_refresh_token(&payload.refresh_token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to revoke token");
            AppError::internal("failed to revoke token")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_session(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = auth_service(&state);
    let user = service.get_current_user(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
        AppError::internal("failed to fetch current user")
    })?;

    match user {
        Some(user) => Ok(Json(with_user_url(&state, user))),
        None => Err(AppError::not_found("user not found")),
    }
}

#[derive(Deserialize)]
pub struct CheckUsernameRequest {
    pub username: String,
}

#[derive(Serialize)]
pub struct CheckUsernameResponse {
    pub available: bool,
}

pub async fn check_username(
    State(state): State<AppState>,
    Json(payload): Json<CheckUsernameRequest>,
) -> Result<Json<CheckUsernameResponse>, AppError> {
    if payload.username.trim().is_empty() {
        return Err(AppError::bad_request("username is required"));
    }

    let service = UserService::new(state.db.clone());
    let taken = service.username_taken(&payload.username).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to check username");
        AppError::internal("failed to check username")
    })?;

    Ok(Json(CheckUsernameResponse { available: !taken }))
}

// ---------------------------------------------------------------------------
// Users and profiles
// ---------------------------------------------------------------------------

pub async fn list_users(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let service = UserService::new(state.db.clone());
    let users = service.list_others(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list users");
        AppError::internal("failed to list users")
    })?;

    Ok(Json(
        users
            .into_iter()
            .map(|user| as_public_user(&state, user))
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

pub async fn search_users(
    _auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<PublicUser>>, AppError> {
    let query = query.query.unwrap_or_default();
    if query.trim().is_empty() {
        return Err(AppError::bad_request("query parameter is required"));
    }

    let service = UserService::new(state.db.clone());
    let users = service.search(&query).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to search users");
        AppError::internal("failed to search users")
    })?;

    Ok(Json(
        users
            .into_iter()
            .map(|user| as_public_user(&state, user))
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub phone_number: Option<String>,
}

pub async fn update_profile(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    for (value, name) in [
        (&payload.first_name, "first_name"),
        (&payload.last_name, "last_name"),
        (&payload.phone_number, "phone_number"),
    ] {
        if let Some(value) = value {
            if value.trim().is_empty() {
                return Err(AppError::bad_request(format!("{} cannot be empty", name)));
            }
        }
    }

    let service = UserService::new(state.db.clone());
    let user = service
        .update_profile(
            auth.user_id,
            ProfileUpdate {
                first_name: payload.first_name,
                last_name: payload.last_name,
                address: payload.address,
                city: payload.city,
                country: payload.country,
                phone_number: payload.phone_number,
            },
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to update profile");
            AppError::internal("failed to update profile")
        })?;

    match user {
        Some(user) => Ok(Json(with_user_url(&state, user))),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn set_avatar(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<ImagePayload>,
) -> Result<Json<User>, AppError> {
    let avatar_key = store_image(&state, auth.user_id, "avatars", payload).await?;

    let service = UserService::new(state.db.clone());
    let updated = service
        .set_avatar(auth.user_id, avatar_key.clone())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to set avatar");
            AppError::internal("failed to set avatar")
        })?;

    match updated {
        Some((user, old_key)) => {
            release_image(&state, old_key);
            Ok(Json(with_user_url(&state, user)))
        }
        None => {
            release_image(&state, Some(avatar_key));
            Err(AppError::not_found("user not found"))
        }
    }
}

pub async fn list_blocked_users(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, AppError> {
    let service = UserService::new(state.db.clone());
    let users = service.list_blocked().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list blocked users");
        AppError::internal("failed to list blocked users")
    })?;

    Ok(Json(
        users
            .into_iter()
            .map(|user| with_user_url(&state, user))
            .collect(),
    ))
}

pub async fn unblock_user(
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = UserService::new(state.db.clone());
    let unblocked = service.unblock(id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %id, "failed to unblock user");
        AppError::internal("failed to unblock user")
    })?;

    if unblocked {
        tracing::info!(user_id = %id, "user unblocked");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("user not found or not blocked"))
    }
}

// ---------------------------------------------------------------------------
// Friendships
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct FriendRequestBody {
    pub receiver_id: Uuid,
}

pub async fn send_friend_request(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<FriendRequestBody>,
) -> Result<(StatusCode, Json<Friendship>), AppError> {
    if payload.receiver_id == auth.user_id {
        return Err(AppError::bad_request(
            "cannot send a friend request to yourself",
        ));
    }

    let users = UserService::new(state.db.clone());
    let receiver = users.get_user(payload.receiver_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to send friend request");
        AppError::internal("failed to send friend request")
    })?;
    if receiver.is_none() {
        return Err(AppError::not_found("user not found"));
    }

    let service = FriendshipService::new(state.db.clone());
    let friendship = service
        .send_request(auth.user_id, payload.receiver_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to send friend request");
            AppError::internal("failed to send friend request")
        })?;

    match friendship {
        Some(friendship) => Ok((StatusCode::CREATED, Json(friendship))),
        None => Err(AppError::conflict("friend request already exists")),
    }
}

pub async fn list_friend_requests(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<FriendRequest>>, AppError> {
    let service = FriendshipService::new(state.db.clone());
    let mut requests = service.list_incoming(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list friend requests");
        AppError::internal("failed to list friend requests")
    })?;

    for request in &mut requests {
        if let Some(key) = &request.sender_avatar_key {
            request.sender_avatar_url = state.storage.public_url(key);
        }
    }

    Ok(Json(requests))
}

pub async fn accept_friend_request(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Friendship>, AppError> {
    let service = FriendshipService::new(state.db.clone());
    let friendship = service.accept_request(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to accept friend request");
        AppError::internal("failed to accept friend request")
    })?;

    match friendship {
        Some(friendship) => Ok(Json(friendship)),
        None => Err(AppError::not_found("friend request not found")),
    }
}

pub async fn reject_friend_request(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Friendship>, AppError> {
    let service = FriendshipService::new(state.db.clone());
    let friendship = service.reject_request(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to reject friend request");
        AppError::internal("failed to reject friend request")
    })?;

    match friendship {
        Some(friendship) => Ok(Json(friendship)),
        None => Err(AppError::not_found("friend request not found")),
    }
}

#[derive(Deserialize)]
pub struct AcceptFriendBody {
    pub sender_id: Uuid,
}

pub async fn accept_friend(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<AcceptFriendBody>,
) -> Result<Json<Friendship>, AppError> {
    let service = FriendshipService::new(state.db.clone());
    let friendship = service
        .accept_from(auth.user_id, payload.sender_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to accept friend request");
            AppError::internal("failed to accept friend request")
        })?;

    match friendship {
        Some(friendship) => Ok(Json(friendship)),
        None => Err(AppError::not_found("friend request not found")),
    }
}

pub async fn remove_friend(
    auth: AuthUser,
    Path(friend_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = FriendshipService::new(state.db.clone());
    let removed = service
        .remove_friend(auth.user_id, friend_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to remove friendship");
            AppError::internal("failed to remove friendship")
        })?;

    if removed {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("friendship not found"))
    }
}

pub async fn friend_statuses(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<HashMap<Uuid, FriendStatus>>, AppError> {
    let service = FriendshipService::new(state.db.clone());
    let statuses = service.friend_statuses(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to compute friend statuses");
        AppError::internal("failed to compute friend statuses")
    })?;

    Ok(Json(statuses))
}

// ---------------------------------------------------------------------------
// Posts and moderation
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub image: Option<ImagePayload>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    let content = payload.content.trim().to_string();
    if content.is_empty() {
        return Err(AppError::bad_request("content is required"));
    }
    if content.len() > MAX_CONTENT_LEN {
        return Err(AppError::bad_request("content must be at most 5000 characters"));
    }

    let image_key = match payload.image {
        Some(image) => Some(store_image(&state, auth.user_id, "posts", image).await?),
        None => None,
    };

    let service = post_service(&state);
    let post = service
        .create_post(auth.user_id, content, image_key)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok((StatusCode::CREATED, Json(with_post_url(&state, post))))
}

pub async fn list_my_posts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, AppError> {
    let service = post_service(&state);
    let posts = service.list_mine(auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list posts");
        AppError::internal("failed to list posts")
    })?;

    Ok(Json(
        posts
            .into_iter()
            .map(|post| with_post_url(&state, post))
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct FeedQuery {
    pub limit: Option<i64>,
}

pub async fn friends_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<FeedPost>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT);
    if !(1..=200).contains(&limit) {
        return Err(AppError::bad_request("limit must be between 1 and 200"));
    }

    let service = FeedService::new(state.db.clone(), state.cache.clone());
    let mut posts = service.friends_feed(auth.user_id, limit).await.map_err(|err| {
        tracing::error!(error = ?err, "failed to load feed");
        AppError::internal("failed to load feed")
    })?;

    for post in &mut posts {
        if let Some(key) = &post.image_key {
            post.image_url = state.storage.public_url(key);
        }
        if let Some(key) = &post.owner_avatar_key {
            post.owner_avatar_url = state.storage.public_url(key);
        }
    }

    Ok(Json(posts))
}

pub async fn list_pending_posts(
    _admin: AdminUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Post>>, AppError> {
    let service = post_service(&state);
    let posts = service.list_pending().await.map_err(|err| {
        tracing::error!(error = ?err, "failed to list pending posts");
        AppError::internal("failed to list pending posts")
    })?;

    Ok(Json(
        posts
            .into_iter()
            .map(|post| with_post_url(&state, post))
            .collect(),
    ))
}

#[derive(Deserialize)]
pub struct UpdatePostRequest {
    pub content: Option<String>,
    pub image: Option<ImagePayload>,
    #[serde(default)]
    pub remove_image: bool,
}

pub async fn update_post(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UpdatePostRequest>,
) -> Result<Json<Post>, AppError> {
    let content = match payload.content {
        Some(content) => {
            let content = content.trim().to_string();
            if content.is_empty() {
                return Err(AppError::bad_request("content cannot be empty"));
            }
            if content.len() > MAX_CONTENT_LEN {
                return Err(AppError::bad_request("content must be at most 5000 characters"));
            }
            Some(content)
        }
        None => None,
    };
    if payload.image.is_some() && payload.remove_image {
        return Err(AppError::bad_request(
            "cannot replace and remove the image in one edit",
        ));
    }

    let new_image_key = match payload.image {
        Some(image) => Some(store_image(&state, auth.user_id, "posts", image).await?),
        None => None,
    };

    let service = post_service(&state);
    let updated = service
        .update_post(
            auth.user_id,
            id,
            content,
            new_image_key.clone(),
            payload.remove_image,
        )
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to update post");
            AppError::internal("failed to update post")
        })?;

    match updated {
        Some(updated) => {
            release_image(&state, updated.replaced_image_key);
            Ok(Json(with_post_url(&state, updated.post)))
        }
        None => {
            // The new blob was stored before we learned the post is not ours.
            release_image(&state, new_image_key);
            Err(AppError::not_found("post not found"))
        }
    }
}

pub async fn delete_post(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = post_service(&state);
    let deleted = service.delete_post(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to delete post");
        AppError::internal("failed to delete post")
    })?;

    match deleted {
        Some(deleted) => {
            release_image(&state, deleted.image_key);
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn approve_post(
    admin: AdminUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Post>, AppError> {
    let service = post_service(&state);
    let outcome = service.approve(admin.0.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to approve post");
        AppError::internal("failed to approve post")
    })?;

    match outcome {
        Approval::Approved { post } => Ok(Json(with_post_url(&state, post))),
        Approval::NotPending => Err(AppError::conflict("post is not pending review")),
        Approval::NotFound => Err(AppError::not_found("post not found")),
    }
}

#[derive(Deserialize)]
pub struct RejectPostRequest {
    pub reason: String,
}

pub async fn reject_post(
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<RejectPostRequest>,
) -> Result<Json<Post>, AppError> {
    let reason = payload.reason.trim().to_string();
    if reason.is_empty() {
        return Err(AppError::bad_request("reason is required"));
    }

    let service = post_service(&state);
    let outcome = service.reject(id, reason).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to reject post");
        AppError::internal("failed to reject post")
    })?;

    match outcome {
        Rejection::Rejected { post, .. } => Ok(Json(with_post_url(&state, post))),
        Rejection::NotPending => Err(AppError::conflict("post is not pending review")),
        Rejection::NotFound => Err(AppError::not_found("post not found")),
    }
}

// ---------------------------------------------------------------------------
// Engagement
// ---------------------------------------------------------------------------

pub async fn toggle_like(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<LikeToggle>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let toggled = service.toggle_like(auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to toggle like");
        AppError::internal("failed to toggle like")
    })?;

    match toggled {
        Some(toggle) => Ok(Json(toggle)),
        None => Err(AppError::not_found("post not found")),
    }
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub body: String,
}

pub async fn comment_post(
    auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<crate::domain::engagement::Comment>), AppError> {
    let body = payload.body.trim().to_string();
    if body.is_empty() {
        return Err(AppError::bad_request("comment body is required"));
    }
    if body.len() > MAX_COMMENT_LEN {
        return Err(AppError::bad_request("comment must be at most 1000 characters"));
    }

    let service = EngagementService::new(state.db.clone());
    let comment = service
        .comment_post(auth.user_id, id, body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to comment on post");
            AppError::internal("failed to comment on post")
        })?;

    match comment {
        Some(comment) => Ok((StatusCode::CREATED, Json(comment))),
        None => Err(AppError::not_found("post not found")),
    }
}

pub async fn list_comments(
    _auth: AuthUser,
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::domain::engagement::Comment>>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let comments = service.list_comments(id).await.map_err(|err| {
        tracing::error!(error = ?err, post_id = %id, "failed to list comments");
        AppError::internal("failed to list comments")
    })?;

    Ok(Json(comments))
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub body: String,
}

pub async fn send_message(
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<crate::domain::message::Message>), AppError> {
    let body = payload.body.trim().to_string();
    if body.is_empty() {
        return Err(AppError::bad_request("message body is required"));
    }
    if body.len() > MAX_MESSAGE_LEN {
        return Err(AppError::bad_request("message must be at most 5000 characters"));
    }
    if payload.receiver_id == auth.user_id {
        return Err(AppError::bad_request("cannot message yourself"));
    }

    let service = MessageService::new(state.db.clone(), state.events.clone());
    let message = service
        .send(auth.user_id, payload.receiver_id, body)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to send message");
            AppError::internal("failed to send message")
        })?;

    match message {
        Some(message) => Ok((StatusCode::CREATED, Json(message))),
        None => Err(AppError::not_found("user not found")),
    }
}

pub async fn get_conversation(
    auth: AuthUser,
    Path(friend_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<crate::domain::message::Message>>, AppError> {
    let service = MessageService::new(state.db.clone(), state.events.clone());
    let messages = service
        .conversation(auth.user_id, friend_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to load conversation");
            AppError::internal("failed to load conversation")
        })?;

    Ok(Json(messages))
}

// ---------------------------------------------------------------------------
// Realtime
// ---------------------------------------------------------------------------

pub async fn event_stream(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|event| match event {
        Ok(event) => Some(Ok(Event::default()
            .event(event.name)
            .data(event.payload.to_string()))),
        // Lagged subscribers skip what they missed; there is no backlog.
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

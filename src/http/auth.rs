use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use sqlx::Row;

use crate::app::auth::AuthService;
use crate::domain::user::UserRole;
use crate::http::AppError;
use crate::AppState;

/// The caller's identity, resolved fresh from the store on every request so
/// that a block takes effect immediately, regardless of token lifetime.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: uuid::Uuid,
    pub role: UserRole,
}

/// An authenticated caller with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("invalid Authorization header"))?;

        let service = AuthService::new(
            state.db.clone(),
            state.paseto_access_key,
            state.paseto_refresh_key,
            state.access_ttl_minutes,
            state.refresh_ttl_days,
        );
        let session = service
            .authenticate_access_token(token)
            .await
            .map_err(|_| AppError::internal("failed to authenticate"))?;

        let session = session.ok_or_else(|| AppError::unauthorized("invalid token"))?;

        let row = sqlx::query("SELECT role::text AS role, is_blocked FROM users WHERE id = $1")
            .bind(session.user_id)
            .fetch_optional(state.db.pool())
            .await
            .map_err(|_| AppError::internal("failed to authenticate"))?
            .ok_or_else(|| AppError::unauthorized("invalid token"))?;

        let is_blocked: bool = row.get("is_blocked");
        if is_blocked {
            return Err(AppError::forbidden("account is blocked"));
        }

        let role: String = row.get("role");
        let role =
            UserRole::from_db(&role).ok_or_else(|| AppError::internal("failed to authenticate"))?;

        Ok(AuthUser {
            user_id: session.user_id,
            role,
        })
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.role.is_admin() {
            return Err(AppError::forbidden("admin access required"));
        }
        Ok(AdminUser(auth))
    }
}

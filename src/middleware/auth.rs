use axum::{extract::FromRequestParts, http::header, http::request::Parts};
use uuid::Uuid;

use crate::{db::DbPool, error::AppError, state::AppState};

/// Identity resolved once per request: who is calling, and whether they
/// are an administrator.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub is_admin: bool,
}

/// An [`AuthUser`] that passed the admin check.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if !user.is_admin {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn is_admin(pool: &DbPool, user_id: Uuid) -> Result<bool, AppError> {
    let row: Option<(Uuid,)> = sqlx::query_as("SELECT user_id FROM admin_users WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;

        let identity = state
            .identity
            .user_for_token(token)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let is_admin = is_admin(&state.pool, identity.id).await?;

        Ok(AuthUser {
            user_id: identity.id,
            email: identity.email,
            is_admin,
        })
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        ensure_admin(&user)?;
        Ok(AdminUser(user))
    }
}

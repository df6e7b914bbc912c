//! Bearer-session auth boundary.
//!
//! The OAuth exchange itself happens at the identity provider; this module
//! owns what lands on our side of it: session lookup for request auth, and
//! user creation on first sign-in (3 starter credits via column default).

pub mod handlers;

use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::Utc;
use rand::{distributions::Alphanumeric, Rng};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::User;
use crate::state::AppState;

const SESSION_TOKEN_LEN: usize = 48;
const SESSION_TTL_DAYS: i64 = 30;

/// Authenticated caller, extracted from the `Authorization: Bearer <token>`
/// header against the sessions table. Rejects with 401 on any miss; never
/// reveals whether the token or the session was the problem.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
}

#[async_trait::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Unauthorized)?;

        let user: Option<User> = sqlx::query_as(
            r#"
            SELECT u.* FROM users u
            JOIN sessions s ON s.user_id = u.id
            WHERE s.token = $1 AND s.expires_at > now()
            "#,
        )
        .bind(token)
        .fetch_optional(&state.db)
        .await?;

        user.map(|user| AuthUser { user })
            .ok_or(AppError::Unauthorized)
    }
}

/// Looks up a user by identity-provider subject, creating the row on first
/// sign-in. New users start with 3 credits (column default, not a ledger
/// transaction).
pub async fn find_or_create_user(
    pool: &PgPool,
    external_id: &str,
    email: &str,
) -> Result<User, AppError> {
    if let Some(user) = sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_id = $1")
        .bind(external_id)
        .fetch_optional(pool)
        .await?
    {
        return Ok(user);
    }

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (external_id, email) VALUES ($1, $2) RETURNING *",
    )
    .bind(external_id)
    .bind(email)
    .fetch_one(pool)
    .await?;

    info!("Created user {} on first sign-in", user.id);
    Ok(user)
}

/// Issues a fresh session token for a user. Called by the OAuth callback
/// after the provider exchange succeeds.
pub async fn create_session(pool: &PgPool, user_id: Uuid) -> Result<String, AppError> {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect();

    sqlx::query("INSERT INTO sessions (user_id, token, expires_at) VALUES ($1, $2, $3)")
        .bind(user_id)
        .bind(&token)
        .bind(Utc::now() + chrono::Duration::days(SESSION_TTL_DAYS))
        .execute(pool)
        .await?;

    Ok(token)
}

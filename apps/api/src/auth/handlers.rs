use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{create_session, find_or_create_user, AuthUser};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub email: String,
    pub credits: i32,
    pub subscription_tier: String,
}

/// GET /api/v1/auth/me
pub async fn handle_me(auth: AuthUser) -> Json<MeResponse> {
    let user = auth.user;
    Json(MeResponse {
        id: user.id,
        email: user.email,
        credits: user.credits,
        subscription_tier: user.subscription_tier,
    })
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub external_id: String,
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user_id: Uuid,
}

/// POST /api/v1/auth/session
///
/// Called by the OAuth callback after the provider exchange succeeds: upserts
/// the user (3 starter credits on first sign-in) and issues a bearer token.
pub async fn handle_session(
    State(state): State<AppState>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    if request.external_id.trim().is_empty() || request.email.trim().is_empty() {
        return Err(AppError::Validation(
            "external_id and email are required".to_string(),
        ));
    }

    let user = find_or_create_user(&state.db, &request.external_id, &request.email).await?;
    let token = create_session(&state.db, user.id).await?;

    Ok(Json(SessionResponse {
        token,
        user_id: user.id,
    }))
}

//! Axum route handlers for the Resumes API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::generation::gate::run_generation;
use crate::generation::store::ResumeStore;
use crate::generation::ResumeContent;
use crate::models::resume::ResumeRow;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub jd_text: String,
    /// Free demo run: fallback content, no credit check, no debit.
    #[serde(default)]
    pub demo: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub resume_id: Uuid,
    pub resume: ResumeContent,
    pub is_demo: bool,
    pub degraded: bool,
    pub credits_remaining: i32,
}

/// POST /api/v1/resumes/generate
///
/// Gated generation: 400 on blank jd_text, 402 when the balance cannot cover
/// the cost, 200 with the generated content and the ledger's actual post-debit
/// balance otherwise.
pub async fn handle_generate(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, AppError> {
    let outcome = run_generation(
        state.ledger.as_ref(),
        state.generator.as_ref(),
        state.store.as_ref(),
        auth.user.id,
        &request.jd_text,
        request.demo,
    )
    .await?;

    Ok(Json(GenerateResponse {
        resume_id: outcome.resume_id,
        resume: outcome.content,
        is_demo: outcome.is_demo,
        degraded: outcome.degraded,
        credits_remaining: outcome.credits_remaining,
    }))
}

/// GET /api/v1/resumes/:id
///
/// Owner-scoped: another user's resume is indistinguishable from a missing one.
pub async fn handle_get_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(resume_id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = state
        .store
        .find_for_user(resume_id, auth.user.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {resume_id} not found")))?;

    Ok(Json(resume))
}

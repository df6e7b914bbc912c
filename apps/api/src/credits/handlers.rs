//! Axum route handlers for the Credits API.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::credits::ledger::{CreditStats, Ledger};
use crate::errors::AppError;
use crate::models::credits::{CreditPackageRow, CreditTransactionRow};
use crate::state::AppState;

const MAX_PURCHASE_QUANTITY: i32 = 10;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub credits: i32,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub transactions: Vec<CreditTransactionRow>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub package_id: Uuid,
    pub quantity: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub checkout_url: String,
    pub session_id: String,
}

/// GET /api/v1/credits/balance
///
/// Returns the caller's balance only; the user id comes from the session,
/// never from the request.
pub async fn handle_balance(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, AppError> {
    let credits = state.ledger.balance(auth.user.id).await?;
    Ok(Json(BalanceResponse { credits }))
}

/// GET /api/v1/credits/history?limit=N
///
/// Most-recent first. `limit` is clamped server-side to [1, 100].
pub async fn handle_history(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let transactions = state.ledger.history(auth.user.id, params.limit).await?;
    Ok(Json(HistoryResponse { transactions }))
}

/// GET /api/v1/credits/packages
///
/// Public catalog of active packages, ordered by sort_order.
pub async fn handle_packages(
    State(state): State<AppState>,
) -> Result<Json<Vec<CreditPackageRow>>, AppError> {
    let packages = state.ledger.list_packages().await?;
    Ok(Json(packages))
}

/// POST /api/v1/credits/purchase
///
/// Creates a provider checkout session and a pending payment row keyed by
/// the session id. Grants nothing itself; the webhook applies credits once
/// the provider confirms.
pub async fn handle_purchase(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let quantity = request.quantity.unwrap_or(1);
    if !(1..=MAX_PURCHASE_QUANTITY).contains(&quantity) {
        return Err(AppError::Validation(format!(
            "quantity must be between 1 and {MAX_PURCHASE_QUANTITY}"
        )));
    }

    let package: Option<CreditPackageRow> =
        sqlx::query_as("SELECT * FROM credit_packages WHERE id = $1 AND is_active")
            .bind(request.package_id)
            .fetch_optional(&state.db)
            .await?;

    let package = package
        .ok_or_else(|| AppError::NotFound(format!("Package {} not found", request.package_id)))?;

    let session = state
        .checkout
        .create_session(auth.user.id, &package, quantity)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO payments (user_id, stripe_session_id, amount_cents, credits_purchased)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(auth.user.id)
    .bind(&session.id)
    .bind(package.price_cents * quantity)
    .bind(package.credits * quantity)
    .execute(&state.db)
    .await?;

    Ok(Json(PurchaseResponse {
        checkout_url: session.url,
        session_id: session.id,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Admin surface (shared-token auth, not user sessions)
// ────────────────────────────────────────────────────────────────────────────

fn require_admin(headers: &HeaderMap, state: &AppState) -> Result<(), AppError> {
    let token = headers
        .get("X-Admin-Token")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?;

    if token
        .as_bytes()
        .ct_eq(state.config.admin_api_token.as_bytes())
        .into()
    {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    pub user_id: Uuid,
    pub delta: i32,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct AdjustResponse {
    pub credits: i32,
}

/// POST /api/v1/admin/credits/adjust
///
/// Audited balance correction: every adjustment lands in the transaction log
/// as `admin_adjustment`, so the balance always reconciles. There is no
/// unaudited overwrite path.
pub async fn handle_adjust(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AdjustRequest>,
) -> Result<Json<AdjustResponse>, AppError> {
    require_admin(&headers, &state)?;

    if request.reason.trim().is_empty() {
        return Err(AppError::Validation(
            "An adjustment reason is required".to_string(),
        ));
    }

    let credits = state
        .ledger
        .adjust(request.user_id, request.delta, request.reason.trim())
        .await?;

    Ok(Json(AdjustResponse { credits }))
}

/// GET /api/v1/admin/credits/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CreditStats>, AppError> {
    require_admin(&headers, &state)?;
    Ok(Json(state.ledger.stats().await?))
}

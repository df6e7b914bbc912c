pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::auth::handlers as auth_handlers;
use crate::billing::handlers as billing_handlers;
use crate::credits::handlers as credits_handlers;
use crate::generation::handlers as generation_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Auth API
        .route("/api/v1/auth/session", post(auth_handlers::handle_session))
        .route("/api/v1/auth/me", get(auth_handlers::handle_me))
        // Credits API
        .route(
            "/api/v1/credits/balance",
            get(credits_handlers::handle_balance),
        )
        .route(
            "/api/v1/credits/history",
            get(credits_handlers::handle_history),
        )
        .route(
            "/api/v1/credits/packages",
            get(credits_handlers::handle_packages),
        )
        .route(
            "/api/v1/credits/purchase",
            post(credits_handlers::handle_purchase),
        )
        // Admin API (shared-token auth)
        .route(
            "/api/v1/admin/credits/adjust",
            post(credits_handlers::handle_adjust),
        )
        .route(
            "/api/v1/admin/credits/stats",
            get(credits_handlers::handle_stats),
        )
        // Billing webhook (signature-verified, not session-authenticated)
        .route(
            "/api/v1/billing/webhook",
            post(billing_handlers::handle_webhook),
        )
        // Resumes API
        .route(
            "/api/v1/resumes/generate",
            post(generation_handlers::handle_generate),
        )
        .route(
            "/api/v1/resumes/:id",
            get(generation_handlers::handle_get_resume),
        )
        .with_state(state)
}

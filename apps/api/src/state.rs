use std::sync::Arc;

use sqlx::PgPool;

use crate::billing::checkout::CheckoutClient;
use crate::config::Config;
use crate::credits::ledger::PgCreditLedger;
use crate::generation::store::PgResumeStore;
use crate::generation::ResumeGenerator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    /// Single source of truth for balances. Injected, never a process-wide
    /// singleton, so components over it stay testable in isolation.
    pub ledger: Arc<PgCreditLedger>,
    pub checkout: CheckoutClient,
    /// Pluggable generation backend. Default: LLM pipeline with static fallback.
    pub generator: Arc<dyn ResumeGenerator>,
    pub store: Arc<PgResumeStore>,
}

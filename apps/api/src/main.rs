mod auth;
mod billing;
mod config;
mod credits;
mod db;
mod errors;
mod generation;
mod llm_client;
mod models;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::billing::checkout::CheckoutClient;
use crate::config::Config;
use crate::credits::ledger::PgCreditLedger;
use crate::db::create_pool;
use crate::generation::pipeline::LlmGenerator;
use crate::generation::store::PgResumeStore;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("vitae_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Vitae API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;

    // Initialize LLM client
    let llm = LlmClient::new(config.openrouter_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    // Initialize Stripe checkout client
    let checkout = CheckoutClient::new(
        config.stripe_secret_key.clone(),
        config.checkout_success_url.clone(),
        config.checkout_cancel_url.clone(),
    );
    info!("Checkout client initialized");

    // Credit ledger + resume store over the shared pool
    let ledger = Arc::new(PgCreditLedger::new(pool.clone()));
    let store = Arc::new(PgResumeStore::new(pool.clone()));
    let generator = Arc::new(LlmGenerator::new(llm));

    // Seed the package catalog. Failures are logged, never fatal: the app
    // must come up even when seeding cannot run.
    if let Err(e) = ledger.seed_packages().await {
        warn!("Package seeding failed (continuing startup): {e}");
    }

    // Build app state
    let state = AppState {
        db: pool,
        config: config.clone(),
        ledger,
        checkout,
        generator,
        store,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

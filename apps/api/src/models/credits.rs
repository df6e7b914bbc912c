use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Transaction type matching the `credit_tx_type` Postgres enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "credit_tx_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Purchase,
    Usage,
    Bonus,
    AdminAdjustment,
}

/// Immutable audit record of a balance change. Never updated or deleted.
/// `amount` is negative for usage, positive otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditTransactionRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tx_type: TransactionType,
    pub amount: i32,
    pub description: String,
    pub resume_id: Option<Uuid>,
    pub payment_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Purchasable SKU. Seeded once at startup; read-only at request time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CreditPackageRow {
    pub id: Uuid,
    pub name: String,
    pub credits: i32,
    pub price_cents: i32,
    pub stripe_price_id: String,
    pub is_active: bool,
    pub sort_order: i32,
}

/// Record of an external checkout session, keyed by the provider session id.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub stripe_session_id: String,
    pub amount_cents: i32,
    pub credits_purchased: i32,
    pub status: String,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

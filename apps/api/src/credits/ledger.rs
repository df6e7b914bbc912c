//! Credit Ledger — single source of truth for a user's spendable balance
//! and its append-only audit trail.
//!
//! Every balance mutation goes through this module and commits together with
//! its transaction record, or not at all. Debits use a single conditional
//! UPDATE so two concurrent requests cannot both spend the same credit.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::credits::{CreditPackageRow, CreditTransactionRow, TransactionType};

const HISTORY_DEFAULT_LIMIT: i64 = 50;
const HISTORY_MAX_LIMIT: i64 = 100;

/// Aggregate credit statistics across all users.
/// `total_used` is a positive magnitude even though usage rows store
/// negative amounts.
#[derive(Debug, Clone, Serialize)]
pub struct CreditStats {
    pub total_purchased: i64,
    pub total_used: i64,
    pub net_credits: i64,
}

/// Ledger operations, behind a trait so the generation gate can be tested
/// against an in-memory fake.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn balance(&self, user_id: Uuid) -> Result<i32, AppError>;

    async fn has_sufficient(&self, user_id: Uuid, required: i32) -> Result<bool, AppError> {
        Ok(self.balance(user_id).await? >= required)
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: &str,
        resume_id: Option<Uuid>,
    ) -> Result<i32, AppError>;

    async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: &str,
        payment_id: Option<Uuid>,
    ) -> Result<i32, AppError>;

    /// Applies a completed checkout session exactly once. Returns the new
    /// balance, or `None` when the session id was already processed or is
    /// unknown — the caller skips without crediting in that case.
    async fn apply_checkout(
        &self,
        session_id: &str,
        user_id: Uuid,
        amount: i32,
    ) -> Result<Option<i32>, AppError>;

    async fn history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<CreditTransactionRow>, AppError>;
}

/// Clamps a requested history page size to `[1, 100]`, defaulting to 50.
pub fn clamp_history_limit(limit: Option<i64>) -> i64 {
    limit
        .unwrap_or(HISTORY_DEFAULT_LIMIT)
        .clamp(1, HISTORY_MAX_LIMIT)
}

/// Maps a zero-row adjustment update to the right rejection: a missing user
/// is `NotFound`, an overdrawing negative delta is `InsufficientCredits`.
fn adjust_rejection(user_id: Uuid, delta: i32, current: Option<i32>) -> AppError {
    match current {
        None => AppError::NotFound(format!("User {user_id} not found")),
        Some(_) => AppError::InsufficientCredits(format!(
            "Adjustment of {delta} would drive the balance negative"
        )),
    }
}

/// Postgres-backed ledger. Constructed once in `main` and injected through
/// `AppState`; holds only the shared pool.
#[derive(Clone)]
pub struct PgCreditLedger {
    pool: PgPool,
}

impl PgCreditLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Audited replacement for direct admin balance overwrites. Appends an
    /// `admin_adjustment` row so the balance always reconciles against the
    /// transaction log. Negative deltas are guarded like debits.
    pub async fn adjust(&self, user_id: Uuid, delta: i32, reason: &str) -> Result<i32, AppError> {
        if delta == 0 {
            return Err(AppError::Validation(
                "Adjustment delta must be non-zero".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Positive deltas only fail when the user row is missing; negative
        // deltas also need the overdraw guard.
        let new_balance: Option<i32> = if delta > 0 {
            sqlx::query_scalar(
                "UPDATE users SET credits = credits + $1 WHERE id = $2 RETURNING credits",
            )
            .bind(delta)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
        } else {
            sqlx::query_scalar(
                r#"
                UPDATE users
                SET credits = credits + $1
                WHERE id = $2 AND credits + $1 >= 0
                RETURNING credits
                "#,
            )
            .bind(delta)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
        };

        let new_balance = match new_balance {
            Some(b) => b,
            None => {
                // Zero rows is ambiguous for negative deltas: the user may
                // not exist, or the balance cannot absorb the delta.
                let current: Option<i32> =
                    sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
                        .bind(user_id)
                        .fetch_optional(&mut *tx)
                        .await?;
                return Err(adjust_rejection(user_id, delta, current));
            }
        };

        insert_transaction(
            &mut tx,
            user_id,
            TransactionType::AdminAdjustment,
            delta,
            reason,
            None,
            None,
        )
        .await?;

        tx.commit().await?;

        info!("Admin adjustment of {delta} for user {user_id}: balance now {new_balance}");
        Ok(new_balance)
    }

    /// Returns active packages in display order.
    pub async fn list_packages(&self) -> Result<Vec<CreditPackageRow>, AppError> {
        Ok(sqlx::query_as::<_, CreditPackageRow>(
            "SELECT * FROM credit_packages WHERE is_active ORDER BY sort_order ASC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// Seeds the fixed package catalog if the table is empty. Idempotent:
    /// a second call is a no-op. Called from startup, where the caller
    /// swallows and logs failures so boot is never blocked.
    pub async fn seed_packages(&self) -> Result<(), AppError> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credit_packages")
            .fetch_one(&self.pool)
            .await?;

        if existing > 0 {
            return Ok(());
        }

        for pkg in default_catalog() {
            // stripe_price_id is unique, so two racing seeders still end up
            // with exactly one row per tier.
            sqlx::query(
                r#"
                INSERT INTO credit_packages (name, credits, price_cents, stripe_price_id, sort_order)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (stripe_price_id) DO NOTHING
                "#,
            )
            .bind(pkg.name)
            .bind(pkg.credits)
            .bind(pkg.price_cents)
            .bind(pkg.stripe_price_id)
            .bind(pkg.sort_order)
            .execute(&self.pool)
            .await?;
        }

        info!("Seeded {} credit packages", default_catalog().len());
        Ok(())
    }

    /// Aggregates transaction amounts by type across all users.
    pub async fn stats(&self) -> Result<CreditStats, AppError> {
        let (purchased, used): (Option<i64>, Option<i64>) = sqlx::query_as(
            r#"
            SELECT
                SUM(amount) FILTER (WHERE tx_type IN ('purchase', 'bonus')),
                SUM(amount) FILTER (WHERE tx_type = 'usage')
            FROM credit_transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let total_purchased = purchased.unwrap_or(0);
        // Usage amounts are stored negative; report magnitude.
        let total_used = used.unwrap_or(0).abs();

        Ok(CreditStats {
            total_purchased,
            total_used,
            net_credits: total_purchased - total_used,
        })
    }
}

#[async_trait]
impl Ledger for PgCreditLedger {
    async fn balance(&self, user_id: Uuid) -> Result<i32, AppError> {
        let credits: Option<i32> = sqlx::query_scalar("SELECT credits FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        credits.ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))
    }

    async fn debit(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: &str,
        resume_id: Option<Uuid>,
    ) -> Result<i32, AppError> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "Debit amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Conditional update: the balance check and the decrement are one
        // statement, so concurrent debits serialize at the row and the
        // balance can never go negative.
        let new_balance: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET credits = credits - $1
            WHERE id = $2 AND credits >= $1
            RETURNING credits
            "#,
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let new_balance = match new_balance {
            Some(b) => b,
            None => {
                warn!("Debit of {amount} rejected for user {user_id}: insufficient balance");
                return Err(AppError::InsufficientCredits(format!(
                    "This action costs {amount} credit(s); your balance is too low"
                )));
            }
        };

        insert_transaction(
            &mut tx,
            user_id,
            TransactionType::Usage,
            -amount,
            reason,
            resume_id,
            None,
        )
        .await?;

        tx.commit().await?;

        info!("Debited {amount} credit(s) from user {user_id}: balance now {new_balance}");
        Ok(new_balance)
    }

    async fn credit(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: &str,
        payment_id: Option<Uuid>,
    ) -> Result<i32, AppError> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "Credit amount must be positive".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        let new_balance: Option<i32> = sqlx::query_scalar(
            "UPDATE users SET credits = credits + $1 WHERE id = $2 RETURNING credits",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let new_balance =
            new_balance.ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        let tx_type = if payment_id.is_some() {
            TransactionType::Purchase
        } else {
            TransactionType::Bonus
        };

        insert_transaction(&mut tx, user_id, tx_type, amount, reason, None, payment_id).await?;

        tx.commit().await?;

        info!("Credited {amount} credit(s) to user {user_id}: balance now {new_balance}");
        Ok(new_balance)
    }

    async fn apply_checkout(
        &self,
        session_id: &str,
        user_id: Uuid,
        amount: i32,
    ) -> Result<Option<i32>, AppError> {
        if amount <= 0 {
            return Err(AppError::Validation(
                "Checkout credit amount must be positive".to_string(),
            ));
        }

        // The status transition, the balance increment, and the purchase row
        // are one transaction. If anything past the transition fails, the
        // payment rolls back to pending and the provider's redelivery can
        // still credit it; a committed transition can never be re-applied.
        let mut tx = self.pool.begin().await?;

        let payment_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE payments
            SET status = 'completed', completed_at = now()
            WHERE stripe_session_id = $1 AND status <> 'completed'
            RETURNING id
            "#,
        )
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?;

        let payment_id = match payment_id {
            Some(id) => id,
            None => return Ok(None),
        };

        let new_balance: Option<i32> = sqlx::query_scalar(
            "UPDATE users SET credits = credits + $1 WHERE id = $2 RETURNING credits",
        )
        .bind(amount)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let new_balance =
            new_balance.ok_or_else(|| AppError::NotFound(format!("User {user_id} not found")))?;

        insert_transaction(
            &mut tx,
            user_id,
            TransactionType::Purchase,
            amount,
            "Credit purchase",
            None,
            Some(payment_id),
        )
        .await?;

        tx.commit().await?;

        info!(
            "Applied checkout session {session_id}: {amount} credit(s) to user {user_id}, balance now {new_balance}"
        );
        Ok(Some(new_balance))
    }

    async fn history(
        &self,
        user_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<CreditTransactionRow>, AppError> {
        let limit = clamp_history_limit(limit);

        Ok(sqlx::query_as::<_, CreditTransactionRow>(
            r#"
            SELECT * FROM credit_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?)
    }
}

async fn insert_transaction(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    tx_type: TransactionType,
    amount: i32,
    description: &str,
    resume_id: Option<Uuid>,
    payment_id: Option<Uuid>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO credit_transactions
            (id, user_id, tx_type, amount, description, resume_id, payment_id)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(tx_type)
    .bind(amount)
    .bind(description)
    .bind(resume_id)
    .bind(payment_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Seed catalog parameters for one package tier.
struct CatalogEntry {
    name: &'static str,
    credits: i32,
    price_cents: i32,
    stripe_price_id: &'static str,
    sort_order: i32,
}

fn default_catalog() -> [CatalogEntry; 4] {
    [
        CatalogEntry {
            name: "Starter",
            credits: 10,
            price_cents: 499,
            stripe_price_id: "price_starter_10",
            sort_order: 1,
        },
        CatalogEntry {
            name: "Standard",
            credits: 30,
            price_cents: 999,
            stripe_price_id: "price_standard_30",
            sort_order: 2,
        },
        CatalogEntry {
            name: "Pro",
            credits: 75,
            price_cents: 1999,
            stripe_price_id: "price_pro_75",
            sort_order: 3,
        },
        CatalogEntry {
            name: "Power",
            credits: 200,
            price_cents: 4499,
            stripe_price_id: "price_power_200",
            sort_order: 4,
        },
    ]
}

//! Billing webhook handler.
//!
//! Translates provider payment events into at-most-one ledger credit per
//! checkout session. Signature verification runs before anything else; after
//! a verified parse the handler always answers 200, even when the internal
//! credit application fails, so the provider does not retry a permanently
//! failing delivery forever. Internal failures are logged at error level for
//! out-of-band alerting.

use axum::{body::Bytes, extract::State, http::HeaderMap, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::billing::signature::verify_signature;
use crate::credits::ledger::Ledger;
use crate::errors::AppError;
use crate::state::AppState;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";
pub const EVENT_PAYMENT_FAILED: &str = "payment_intent.payment_failed";

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub object: Value,
}

/// What a completed checkout carries once its metadata checks out.
#[derive(Debug, PartialEq)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub user_id: Uuid,
    pub credits: i32,
}

/// Pulls the session id and our metadata out of a checkout-session object.
/// Returns `None` when metadata is missing or unparsable; the caller logs
/// and skips rather than crediting blind.
pub fn extract_completed_checkout(object: &Value) -> Option<CompletedCheckout> {
    let session_id = object.get("id")?.as_str()?.to_string();
    let metadata = object.get("metadata")?;
    let user_id: Uuid = metadata.get("user_id")?.as_str()?.parse().ok()?;
    let credits: i32 = metadata.get("credits")?.as_str()?.parse().ok()?;

    if credits <= 0 {
        return None;
    }

    Some(CompletedCheckout {
        session_id,
        user_id,
        credits,
    })
}

/// POST /api/v1/billing/webhook
pub async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let signature_header = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::SignatureVerification)?;

    verify_signature(&body, signature_header, &state.config.stripe_webhook_secret)?;

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Unparsable webhook payload: {e}")))?;

    match event.event_type.as_str() {
        EVENT_CHECKOUT_COMPLETED => {
            match extract_completed_checkout(&event.data.object) {
                Some(checkout) => {
                    // Failures past this point are internal: the event itself
                    // was valid, so acknowledge it either way.
                    if let Err(e) =
                        apply_completed_checkout(state.ledger.as_ref(), &checkout).await
                    {
                        error!(
                            "Credit application failed for session {}: {e}",
                            checkout.session_id
                        );
                    }
                }
                None => {
                    warn!("checkout.session.completed without usable metadata; skipping");
                }
            }
        }
        EVENT_CHECKOUT_EXPIRED | EVENT_PAYMENT_FAILED => {
            if let Some(session_id) = event.data.object.get("id").and_then(|v| v.as_str()) {
                if let Err(e) = mark_payment_failed(&state, session_id).await {
                    error!("Failed to mark payment {session_id} failed: {e}");
                }
            }
            info!("Payment event {} logged; no ledger effect", event.event_type);
        }
        other => {
            info!("Ignoring unhandled webhook event type {other}");
        }
    }

    Ok(Json(json!({ "received": true })))
}

/// Applies a completed checkout exactly once.
///
/// The ledger runs the payment-row status transition, the balance increment,
/// and the purchase row as a single transaction: one delivery per session id
/// wins, a redelivery (or a session we never initiated) credits nothing, and
/// a failed application rolls the payment back to pending so the provider's
/// next retry can still credit it.
async fn apply_completed_checkout(
    ledger: &dyn Ledger,
    checkout: &CompletedCheckout,
) -> Result<(), AppError> {
    match ledger
        .apply_checkout(&checkout.session_id, checkout.user_id, checkout.credits)
        .await?
    {
        Some(new_balance) => {
            info!(
                "Applied {} credit(s) from session {} to user {}: balance now {new_balance}",
                checkout.credits, checkout.session_id, checkout.user_id
            );
        }
        None => {
            info!(
                "Session {} already processed or unknown; skipping credit",
                checkout.session_id
            );
        }
    }
    Ok(())
}

async fn mark_payment_failed(state: &AppState, session_id: &str) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE payments SET status = 'failed' WHERE stripe_session_id = $1 AND status = 'pending'",
    )
    .bind(session_id)
    .execute(&state.db)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::credits::CreditTransactionRow;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn session_object(id: &str, user_id: Option<&str>, credits: Option<&str>) -> Value {
        let mut metadata = serde_json::Map::new();
        if let Some(u) = user_id {
            metadata.insert("user_id".into(), json!(u));
        }
        if let Some(c) = credits {
            metadata.insert("credits".into(), json!(c));
        }
        json!({ "id": id, "metadata": metadata })
    }

    #[test]
    fn test_extract_completed_checkout() {
        let user_id = Uuid::new_v4();
        let object = session_object("cs_test_1", Some(&user_id.to_string()), Some("30"));
        let checkout = extract_completed_checkout(&object).unwrap();
        assert_eq!(checkout.session_id, "cs_test_1");
        assert_eq!(checkout.user_id, user_id);
        assert_eq!(checkout.credits, 30);
    }

    #[test]
    fn test_missing_metadata_is_skipped_not_crashed() {
        let object = json!({ "id": "cs_test_2" });
        assert!(extract_completed_checkout(&object).is_none());

        let object = session_object("cs_test_3", None, Some("30"));
        assert!(extract_completed_checkout(&object).is_none());

        let object = session_object("cs_test_4", Some(&Uuid::new_v4().to_string()), None);
        assert!(extract_completed_checkout(&object).is_none());
    }

    #[test]
    fn test_non_numeric_or_non_positive_credits_rejected() {
        let user = Uuid::new_v4().to_string();
        let object = session_object("cs_test_5", Some(&user), Some("lots"));
        assert!(extract_completed_checkout(&object).is_none());

        let object = session_object("cs_test_6", Some(&user), Some("0"));
        assert!(extract_completed_checkout(&object).is_none());

        let object = session_object("cs_test_7", Some(&user), Some("-5"));
        assert!(extract_completed_checkout(&object).is_none());
    }

    #[test]
    fn test_webhook_event_deserializes() {
        let payload = json!({
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_test_8", "metadata": {} } }
        });
        let event: WebhookEvent = serde_json::from_value(payload).unwrap();
        assert_eq!(event.event_type, EVENT_CHECKOUT_COMPLETED);
    }

    /// Ledger fake that honors once-per-session application.
    #[derive(Default)]
    struct FakeLedger {
        balance: Mutex<i32>,
        applied_sessions: Mutex<HashSet<String>>,
        credit_applications: Mutex<u32>,
    }

    #[async_trait]
    impl Ledger for FakeLedger {
        async fn balance(&self, _user_id: Uuid) -> Result<i32, AppError> {
            Ok(*self.balance.lock().unwrap())
        }

        async fn debit(
            &self,
            _user_id: Uuid,
            _amount: i32,
            _reason: &str,
            _resume_id: Option<Uuid>,
        ) -> Result<i32, AppError> {
            unreachable!("webhook path never debits")
        }

        async fn credit(
            &self,
            _user_id: Uuid,
            _amount: i32,
            _reason: &str,
            _payment_id: Option<Uuid>,
        ) -> Result<i32, AppError> {
            unreachable!("webhook path credits only through apply_checkout")
        }

        async fn apply_checkout(
            &self,
            session_id: &str,
            _user_id: Uuid,
            amount: i32,
        ) -> Result<Option<i32>, AppError> {
            if !self
                .applied_sessions
                .lock()
                .unwrap()
                .insert(session_id.to_string())
            {
                return Ok(None);
            }
            *self.credit_applications.lock().unwrap() += 1;
            let mut balance = self.balance.lock().unwrap();
            *balance += amount;
            Ok(Some(*balance))
        }

        async fn history(
            &self,
            _user_id: Uuid,
            _limit: Option<i64>,
        ) -> Result<Vec<CreditTransactionRow>, AppError> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn test_duplicate_delivery_credits_once() {
        let ledger = FakeLedger::default();
        let checkout = CompletedCheckout {
            session_id: "cs_once".to_string(),
            user_id: Uuid::new_v4(),
            credits: 10,
        };

        apply_completed_checkout(&ledger, &checkout).await.unwrap();
        apply_completed_checkout(&ledger, &checkout).await.unwrap();

        assert_eq!(*ledger.credit_applications.lock().unwrap(), 1);
        assert_eq!(*ledger.balance.lock().unwrap(), 10);
    }

    #[tokio::test]
    async fn test_distinct_sessions_both_credit() {
        let ledger = FakeLedger::default();
        let user_id = Uuid::new_v4();
        for session in ["cs_a", "cs_b"] {
            let checkout = CompletedCheckout {
                session_id: session.to_string(),
                user_id,
                credits: 5,
            };
            apply_completed_checkout(&ledger, &checkout).await.unwrap();
        }

        assert_eq!(*ledger.credit_applications.lock().unwrap(), 2);
        assert_eq!(*ledger.balance.lock().unwrap(), 10);
    }
}

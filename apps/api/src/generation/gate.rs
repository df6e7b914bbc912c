//! Resume Generation Gate.
//!
//! Enforces "generation costs 1 credit" as a precondition around an opaque
//! generation backend. Ordering invariant: the debit happens only after
//! generation and persistence succeed — a failed generation never consumes
//! a credit. The reported remaining balance is always the ledger's actual
//! post-debit return value, never client-side arithmetic.

use tracing::info;
use uuid::Uuid;

use crate::credits::ledger::Ledger;
use crate::errors::AppError;
use crate::generation::store::{NewResume, ResumeStore};
use crate::generation::{ResumeContent, ResumeGenerator};

pub const GENERATION_COST: i32 = 1;

#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub resume_id: Uuid,
    pub content: ResumeContent,
    pub is_demo: bool,
    pub degraded: bool,
    pub credits_remaining: i32,
}

/// Runs one gated generation for a user.
///
/// Demo mode bypasses the gate entirely: fallback content, no balance check,
/// no debit. Otherwise: validate input, check balance, generate, persist,
/// then debit exactly once.
pub async fn run_generation(
    ledger: &dyn Ledger,
    generator: &dyn ResumeGenerator,
    store: &dyn ResumeStore,
    user_id: Uuid,
    jd_text: &str,
    demo: bool,
) -> Result<GenerationOutcome, AppError> {
    let jd_text = jd_text.trim();
    if jd_text.is_empty() {
        return Err(AppError::Validation("jd_text cannot be empty".to_string()));
    }

    if demo {
        let content = crate::generation::fallback::demo_content();
        let resume_id = Uuid::new_v4();
        store
            .save(&NewResume {
                id: resume_id,
                user_id,
                jd_text: jd_text.to_string(),
                content: content.clone(),
                is_demo: true,
            })
            .await?;

        info!("Demo generation {resume_id} for user {user_id} (no debit)");
        return Ok(GenerationOutcome {
            resume_id,
            content,
            is_demo: true,
            degraded: false,
            credits_remaining: ledger.balance(user_id).await?,
        });
    }

    if !ledger.has_sufficient(user_id, GENERATION_COST).await? {
        return Err(AppError::InsufficientCredits(format!(
            "Resume generation costs {GENERATION_COST} credit; purchase credits to continue"
        )));
    }

    let generated = generator.generate(jd_text).await?;

    let resume_id = Uuid::new_v4();
    store
        .save(&NewResume {
            id: resume_id,
            user_id,
            jd_text: jd_text.to_string(),
            content: generated.content.clone(),
            is_demo: generated.degraded,
        })
        .await?;

    // Debit strictly after successful generation and persistence.
    let credits_remaining = ledger
        .debit(user_id, GENERATION_COST, "Resume generation", Some(resume_id))
        .await?;

    info!(
        "Generated resume {resume_id} for user {user_id} (degraded={}): balance now {credits_remaining}",
        generated.degraded
    );

    Ok(GenerationOutcome {
        resume_id,
        content: generated.content,
        is_demo: generated.degraded,
        degraded: generated.degraded,
        credits_remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::GeneratedResume;
    use crate::models::credits::CreditTransactionRow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
    use std::sync::Mutex;

    /// In-memory ledger for a single user.
    struct FakeLedger {
        balance: AtomicI32,
        debits: AtomicI32,
    }

    impl FakeLedger {
        fn with_balance(balance: i32) -> Self {
            Self {
                balance: AtomicI32::new(balance),
                debits: AtomicI32::new(0),
            }
        }
    }

    #[async_trait]
    impl Ledger for FakeLedger {
        async fn balance(&self, _user_id: Uuid) -> Result<i32, AppError> {
            Ok(self.balance.load(Ordering::SeqCst))
        }

        async fn debit(
            &self,
            _user_id: Uuid,
            amount: i32,
            _reason: &str,
            _resume_id: Option<Uuid>,
        ) -> Result<i32, AppError> {
            let current = self.balance.load(Ordering::SeqCst);
            if current < amount {
                return Err(AppError::InsufficientCredits("too low".to_string()));
            }
            self.debits.fetch_add(1, Ordering::SeqCst);
            Ok(self.balance.fetch_sub(amount, Ordering::SeqCst) - amount)
        }

        async fn credit(
            &self,
            _user_id: Uuid,
            amount: i32,
            _reason: &str,
            _payment_id: Option<Uuid>,
        ) -> Result<i32, AppError> {
            Ok(self.balance.fetch_add(amount, Ordering::SeqCst) + amount)
        }

        async fn apply_checkout(
            &self,
            _session_id: &str,
            _user_id: Uuid,
            amount: i32,
        ) -> Result<Option<i32>, AppError> {
            Ok(Some(self.balance.fetch_add(amount, Ordering::SeqCst) + amount))
        }

        async fn history(
            &self,
            _user_id: Uuid,
            _limit: Option<i64>,
        ) -> Result<Vec<CreditTransactionRow>, AppError> {
            Ok(vec![])
        }
    }

    struct FakeGenerator {
        fail: bool,
        called: AtomicBool,
    }

    impl FakeGenerator {
        fn succeeding() -> Self {
            Self {
                fail: false,
                called: AtomicBool::new(false),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                called: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl ResumeGenerator for FakeGenerator {
        async fn generate(&self, _jd_text: &str) -> Result<GeneratedResume, AppError> {
            self.called.store(true, Ordering::SeqCst);
            if self.fail {
                return Err(AppError::Internal(anyhow::anyhow!("generator blew up")));
            }
            Ok(GeneratedResume {
                content: crate::generation::fallback::demo_content(),
                degraded: false,
            })
        }
    }

    #[derive(Default)]
    struct FakeStore {
        saved: Mutex<Vec<NewResume>>,
    }

    #[async_trait]
    impl ResumeStore for FakeStore {
        async fn save(&self, resume: &NewResume) -> Result<(), AppError> {
            self.saved.lock().unwrap().push(resume.clone());
            Ok(())
        }

        async fn find_for_user(
            &self,
            _resume_id: Uuid,
            _user_id: Uuid,
        ) -> Result<Option<crate::models::resume::ResumeRow>, AppError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_successful_generation_debits_once() {
        let ledger = FakeLedger::with_balance(3);
        let generator = FakeGenerator::succeeding();
        let store = FakeStore::default();

        let outcome = run_generation(&ledger, &generator, &store, Uuid::new_v4(), "Rust dev", false)
            .await
            .unwrap();

        assert_eq!(outcome.credits_remaining, 2);
        assert_eq!(ledger.debits.load(Ordering::SeqCst), 1);
        assert_eq!(store.saved.lock().unwrap().len(), 1);
        assert!(!outcome.is_demo);
    }

    #[tokio::test]
    async fn test_failed_generation_never_debits() {
        let ledger = FakeLedger::with_balance(3);
        let generator = FakeGenerator::failing();
        let store = FakeStore::default();

        let result =
            run_generation(&ledger, &generator, &store, Uuid::new_v4(), "Rust dev", false).await;

        assert!(result.is_err());
        assert_eq!(ledger.balance.load(Ordering::SeqCst), 3);
        assert_eq!(ledger.debits.load(Ordering::SeqCst), 0);
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insufficient_balance_rejected_before_generation() {
        let ledger = FakeLedger::with_balance(0);
        let generator = FakeGenerator::succeeding();
        let store = FakeStore::default();

        let result =
            run_generation(&ledger, &generator, &store, Uuid::new_v4(), "Rust dev", false).await;

        assert!(matches!(result, Err(AppError::InsufficientCredits(_))));
        // The generator must not even be invoked when the gate rejects.
        assert!(!generator.called.load(Ordering::SeqCst));
        assert!(store.saved.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_jd_rejected_before_balance_check() {
        let ledger = FakeLedger::with_balance(3);
        let generator = FakeGenerator::succeeding();
        let store = FakeStore::default();

        let result =
            run_generation(&ledger, &generator, &store, Uuid::new_v4(), "   \n\t ", false).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert!(!generator.called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_demo_mode_bypasses_gate_and_never_debits() {
        // Zero balance: demo must still succeed and spend nothing.
        let ledger = FakeLedger::with_balance(0);
        let generator = FakeGenerator::failing();
        let store = FakeStore::default();

        let outcome = run_generation(&ledger, &generator, &store, Uuid::new_v4(), "Any JD", true)
            .await
            .unwrap();

        assert!(outcome.is_demo);
        assert_eq!(outcome.credits_remaining, 0);
        assert_eq!(ledger.debits.load(Ordering::SeqCst), 0);
        // Demo serves fallback content; the real generator is never touched.
        assert!(!generator.called.load(Ordering::SeqCst));
        assert!(store.saved.lock().unwrap()[0].is_demo);
    }
}

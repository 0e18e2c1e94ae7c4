use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use crate::accounts::{Account, DebitOutcome, NewAccount};
use crate::credit_store::CreditStore;
use crate::error::{LedgerError, LedgerResult};

/// Default amount consumed by `use_credits` when the caller omits it
pub const DEFAULT_USE_AMOUNT: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditsAdded {
    pub user_id: Uuid,
    pub credits_added: i32,
    pub total_credits: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditsUsed {
    pub user_id: Uuid,
    pub credits_used: i32,
    pub remaining_credits: i32,
}

/// Validated register/get/add/use operations over a [`CreditStore`]
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn CreditStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn CreditStore>) -> Self {
        Self { store }
    }

    pub async fn register(&self, app_user_id: &str, initial_credits: i32) -> LedgerResult<Account> {
        let id = parse_user_id(app_user_id)?;
        if initial_credits < 0 {
            return Err(LedgerError::validation("Credits must not be negative"));
        }

        let account = self
            .store
            .register(NewAccount {
                id,
                credits: initial_credits,
            })
            .await?;

        metrics::counter!("ledger.accounts.registered").increment(1);
        info!(user_id = %id, credits = initial_credits, "Registered new user");
        Ok(account)
    }

    pub async fn get(&self, app_user_id: &str) -> LedgerResult<Account> {
        let id = parse_user_id(app_user_id)?;
        let account = self.store.get(id).await?.ok_or(LedgerError::NotFound(id))?;

        info!(user_id = %id, credits = account.credits, "Retrieved credits");
        Ok(account)
    }

    pub async fn add_credits(&self, app_user_id: &str, credits: i32) -> LedgerResult<CreditsAdded> {
        let id = parse_user_id(app_user_id)?;
        require_positive(credits)?;

        let total_credits = self
            .store
            .adjust(id, credits)
            .await?
            .ok_or(LedgerError::NotFound(id))?;

        metrics::counter!("ledger.credits.added").increment(credits as u64);
        info!(user_id = %id, added = credits, total = total_credits, "Added credits");
        Ok(CreditsAdded {
            user_id: id,
            credits_added: credits,
            total_credits,
        })
    }

    pub async fn use_credits(&self, app_user_id: &str, credits: i32) -> LedgerResult<CreditsUsed> {
        let id = parse_user_id(app_user_id)?;
        require_positive(credits)?;

        match self.store.debit(id, credits).await? {
            Some(DebitOutcome::Debited { remaining }) => {
                metrics::counter!("ledger.credits.used").increment(credits as u64);
                info!(user_id = %id, used = credits, remaining, "Used credits");
                Ok(CreditsUsed {
                    user_id: id,
                    credits_used: credits,
                    remaining_credits: remaining,
                })
            }
            Some(DebitOutcome::Insufficient { available }) => {
                metrics::counter!("ledger.credits.insufficient").increment(1);
                warn!(user_id = %id, available, requested = credits, "Insufficient credits");
                Err(LedgerError::InsufficientCredits {
                    available,
                    requested: credits,
                })
            }
            None => Err(LedgerError::NotFound(id)),
        }
    }
}

/// Parse a caller-supplied user id
pub fn parse_user_id(raw: &str) -> LedgerResult<Uuid> {
    if raw.trim().is_empty() {
        return Err(LedgerError::validation("app_user_id is required"));
    }
    Uuid::parse_str(raw.trim())
        .map_err(|_| LedgerError::validation("Invalid UUID format for app_user_id"))
}

fn require_positive(credits: i32) -> LedgerResult<()> {
    if credits <= 0 {
        return Err(LedgerError::validation("Credits must be greater than 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryCreditStore;

    fn ledger() -> Ledger {
        Ledger::new(Arc::new(MemoryCreditStore::new()))
    }

    #[tokio::test]
    async fn test_register_then_get_returns_initial_balance() {
        let ledger = ledger();
        let id = Uuid::new_v4();

        for credits in [0, 1, 50] {
            let id = Uuid::new_v4().to_string();
            ledger.register(&id, credits).await.unwrap();
            assert_eq!(ledger.get(&id).await.unwrap().credits, credits);
        }

        let account = ledger.register(&id.to_string(), 7).await.unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.credits, 7);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let ledger = ledger();

        let err = ledger.register("not-a-uuid", 0).await.unwrap_err();
        assert_eq!(err.to_string(), "Invalid UUID format for app_user_id");

        let err = ledger.register("", 0).await.unwrap_err();
        assert_eq!(err.to_string(), "app_user_id is required");

        let err = ledger
            .register(&Uuid::new_v4().to_string(), -1)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_register_twice_conflicts() {
        let ledger = ledger();
        let id = Uuid::new_v4().to_string();

        ledger.register(&id, 0).await.unwrap();
        let err = ledger.register(&id, 5).await.unwrap_err();
        assert!(matches!(err, LedgerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let err = ledger()
            .get(&Uuid::new_v4().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_is_additive() {
        let ledger = ledger();
        let a = Uuid::new_v4().to_string();
        let b = Uuid::new_v4().to_string();
        ledger.register(&a, 50).await.unwrap();
        ledger.register(&b, 50).await.unwrap();

        ledger.add_credits(&a, 30).await.unwrap();
        let split = ledger.add_credits(&a, 70).await.unwrap();
        let joined = ledger.add_credits(&b, 100).await.unwrap();

        assert_eq!(split.total_credits, 150);
        assert_eq!(split.total_credits, joined.total_credits);
        assert_eq!(split.credits_added, 70);
    }

    #[tokio::test]
    async fn test_add_validation() {
        let ledger = ledger();
        let id = Uuid::new_v4().to_string();
        ledger.register(&id, 0).await.unwrap();

        for bad in [0, -5] {
            let err = ledger.add_credits(&id, bad).await.unwrap_err();
            assert_eq!(err.to_string(), "Credits must be greater than 0");
        }

        let err = ledger
            .add_credits(&Uuid::new_v4().to_string(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_add_past_max_is_a_validation_error() {
        let ledger = ledger();
        let id = Uuid::new_v4().to_string();
        ledger.register(&id, 1).await.unwrap();

        let err = ledger.add_credits(&id, i32::MAX).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(ledger.get(&id).await.unwrap().credits, 1);

        let added = ledger.add_credits(&id, i32::MAX - 1).await.unwrap();
        assert_eq!(added.total_credits, i32::MAX);
    }

    #[tokio::test]
    async fn test_use_credits_until_insufficient() {
        let ledger = ledger();
        let id = Uuid::new_v4().to_string();
        ledger.register(&id, 5).await.unwrap();

        let used = ledger.use_credits(&id, 3).await.unwrap();
        assert_eq!(used.remaining_credits, 2);
        assert_eq!(used.credits_used, 3);

        let err = ledger.use_credits(&id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientCredits {
                available: 2,
                requested: 3
            }
        ));
        assert_eq!(ledger.get(&id).await.unwrap().credits, 2);

        let used = ledger.use_credits(&id, 2).await.unwrap();
        assert_eq!(used.remaining_credits, 0);
    }

    #[tokio::test]
    async fn test_use_validation() {
        let ledger = ledger();
        let id = Uuid::new_v4().to_string();
        ledger.register(&id, 5).await.unwrap();

        let err = ledger.use_credits(&id, 0).await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));

        let err = ledger
            .use_credits(&Uuid::new_v4().to_string(), DEFAULT_USE_AMOUNT)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
        assert_eq!(ledger.get(&id).await.unwrap().credits, 5);
    }
}

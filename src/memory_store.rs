use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::accounts::{Account, DebitOutcome, NewAccount};
use crate::credit_store::CreditStore;
use crate::error::{LedgerError, LedgerResult};
use crate::webhook_events::{CreditGrant, GrantOutcome, NewWebhookEvent, WebhookEventRecord};

#[derive(Default)]
struct MemoryState {
    accounts: HashMap<Uuid, Account>,
    events: HashMap<String, WebhookEventRecord>,
}

/// Process-local store for development and tests.
///
/// A single lock covers both tables, so every operation (including a
/// webhook commit touching both) is atomic. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryCreditStore {
    state: Mutex<MemoryState>,
}

impl MemoryCreditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn event_count(&self) -> usize {
        self.state.lock().await.events.len()
    }
}

#[async_trait]
impl CreditStore for MemoryCreditStore {
    async fn register(&self, new_account: NewAccount) -> LedgerResult<Account> {
        let mut state = self.state.lock().await;
        if state.accounts.contains_key(&new_account.id) {
            return Err(LedgerError::Conflict(new_account.id));
        }

        let account = Account {
            id: new_account.id,
            credits: new_account.credits,
            created_at: Utc::now(),
        };
        state.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get(&self, account_id: Uuid) -> LedgerResult<Option<Account>> {
        Ok(self.state.lock().await.accounts.get(&account_id).cloned())
    }

    async fn adjust(&self, account_id: Uuid, delta: i32) -> LedgerResult<Option<i32>> {
        let mut state = self.state.lock().await;
        match state.accounts.get_mut(&account_id) {
            Some(account) => {
                account.credits = checked_add(account.credits, delta)?;
                Ok(Some(account.credits))
            }
            None => Ok(None),
        }
    }

    async fn debit(&self, account_id: Uuid, amount: i32) -> LedgerResult<Option<DebitOutcome>> {
        let mut state = self.state.lock().await;
        let Some(account) = state.accounts.get_mut(&account_id) else {
            return Ok(None);
        };

        if account.credits < amount {
            return Ok(Some(DebitOutcome::Insufficient {
                available: account.credits,
            }));
        }

        account.credits -= amount;
        Ok(Some(DebitOutcome::Debited {
            remaining: account.credits,
        }))
    }

    async fn has_processed(&self, event_id: &str) -> LedgerResult<bool> {
        Ok(self.state.lock().await.events.contains_key(event_id))
    }

    async fn get_event(&self, event_id: &str) -> LedgerResult<Option<WebhookEventRecord>> {
        Ok(self.state.lock().await.events.get(event_id).cloned())
    }

    async fn commit_event(
        &self,
        new_event: NewWebhookEvent,
        grant: Option<CreditGrant>,
    ) -> LedgerResult<GrantOutcome> {
        let mut state = self.state.lock().await;
        if state.events.contains_key(&new_event.event_id) {
            return Err(LedgerError::DuplicateEvent(new_event.event_id));
        }

        // Compute the grant before inserting so an overflow leaves nothing behind
        let outcome = match grant {
            None => GrantOutcome::NotRequested,
            Some(grant) => match state.accounts.get_mut(&grant.account_id) {
                Some(account) => {
                    account.credits = checked_add(account.credits, grant.credits)?;
                    GrantOutcome::Applied {
                        new_balance: account.credits,
                    }
                }
                None => GrantOutcome::AccountMissing,
            },
        };

        let record = WebhookEventRecord {
            event_id: new_event.event_id,
            event_type: new_event.event_type,
            app_user_id: new_event.app_user_id,
            product_id: new_event.product_id,
            environment: new_event.environment,
            event_timestamp: new_event.event_timestamp,
            payload: new_event.payload,
            processed: true,
            created_at: Utc::now(),
        };
        state.events.insert(record.event_id.clone(), record);

        Ok(outcome)
    }
}

fn checked_add(balance: i32, delta: i32) -> LedgerResult<i32> {
    balance
        .checked_add(delta)
        .ok_or_else(LedgerError::balance_overflow)
}

//! Storage seam shared by the ledger and the webhook reconciler.
//!
//! Accounts and the webhook event log live behind one trait so a webhook
//! commit can mutate both in a single transaction.

use async_trait::async_trait;
use uuid::Uuid;

use crate::accounts::{Account, DebitOutcome, NewAccount};
use crate::accounts_repo::AccountsRepository;
use crate::error::{LedgerError, LedgerResult};
use crate::web::PgPool;
use crate::webhook_events::{CreditGrant, GrantOutcome, NewWebhookEvent, WebhookEventRecord};
use crate::webhook_events_repo::WebhookEventsRepository;

#[async_trait]
pub trait CreditStore: Send + Sync {
    /// Create an account. Fails with `Conflict` if the id exists.
    async fn register(&self, new_account: NewAccount) -> LedgerResult<Account>;

    async fn get(&self, account_id: Uuid) -> LedgerResult<Option<Account>>;

    /// Apply `balance += delta`. None when the account does not exist.
    /// Bounds are the caller's problem.
    async fn adjust(&self, account_id: Uuid, delta: i32) -> LedgerResult<Option<i32>>;

    /// Decrement only if the balance covers `amount`. None when the account
    /// does not exist.
    async fn debit(&self, account_id: Uuid, amount: i32) -> LedgerResult<Option<DebitOutcome>>;

    async fn has_processed(&self, event_id: &str) -> LedgerResult<bool>;

    async fn get_event(&self, event_id: &str) -> LedgerResult<Option<WebhookEventRecord>>;

    /// Record the event as processed together with its grant, atomically.
    /// Fails with `DuplicateEvent` if the event id is already recorded.
    async fn commit_event(
        &self,
        new_event: NewWebhookEvent,
        grant: Option<CreditGrant>,
    ) -> LedgerResult<GrantOutcome>;
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgCreditStore {
    accounts: AccountsRepository,
    events: WebhookEventsRepository,
}

impl PgCreditStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: AccountsRepository::new(pool.clone()),
            events: WebhookEventsRepository::new(pool),
        }
    }
}

#[async_trait]
impl CreditStore for PgCreditStore {
    async fn register(&self, new_account: NewAccount) -> LedgerResult<Account> {
        let id = new_account.id;
        self.accounts
            .create(new_account)
            .await?
            .ok_or(LedgerError::Conflict(id))
    }

    async fn get(&self, account_id: Uuid) -> LedgerResult<Option<Account>> {
        Ok(self.accounts.get_by_id(account_id).await?)
    }

    async fn adjust(&self, account_id: Uuid, delta: i32) -> LedgerResult<Option<i32>> {
        self.accounts
            .adjust(account_id, delta)
            .await
            .map_err(store_error)
    }

    async fn debit(&self, account_id: Uuid, amount: i32) -> LedgerResult<Option<DebitOutcome>> {
        Ok(self.accounts.debit(account_id, amount).await?)
    }

    async fn has_processed(&self, event_id: &str) -> LedgerResult<bool> {
        Ok(self.events.has_processed(event_id).await?)
    }

    async fn get_event(&self, event_id: &str) -> LedgerResult<Option<WebhookEventRecord>> {
        Ok(self.events.get_by_event_id(event_id).await?)
    }

    async fn commit_event(
        &self,
        new_event: NewWebhookEvent,
        grant: Option<CreditGrant>,
    ) -> LedgerResult<GrantOutcome> {
        let event_id = new_event.event_id.clone();
        self.events
            .commit(new_event, grant)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::DuplicateEvent(event_id))
    }
}

/// Recover a domain error raised inside a repository, treating anything
/// else as an infrastructure failure
fn store_error(e: anyhow::Error) -> LedgerError {
    match e.downcast::<LedgerError>() {
        Ok(ledger_error) => ledger_error,
        Err(e) => LedgerError::Internal(e),
    }
}

use anyhow::Result;
use diesel::prelude::*;

use crate::accounts_repo::adjust_with_conn;
use crate::web::PgPool;
use crate::webhook_events::{
    CreditGrant, GrantOutcome, NewWebhookEvent, WebhookEventModel, WebhookEventRecord,
};

#[derive(Clone)]
pub struct WebhookEventsRepository {
    pool: PgPool,
}

impl WebhookEventsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check if an event has already been recorded (idempotency)
    pub async fn has_processed(&self, event_id: &str) -> Result<bool> {
        use crate::schema::webhook_events::dsl;

        let pool = self.pool.clone();
        let event_id = event_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let exists: bool = diesel::select(diesel::dsl::exists(
                dsl::webhook_events.filter(dsl::event_id.eq(&event_id)),
            ))
            .get_result(&mut conn)?;

            Ok::<bool, anyhow::Error>(exists)
        })
        .await??;

        Ok(result)
    }

    /// Get a recorded event by its external ID
    pub async fn get_by_event_id(&self, event_id: &str) -> Result<Option<WebhookEventRecord>> {
        use crate::schema::webhook_events::dsl;

        let pool = self.pool.clone();
        let event_id = event_id.to_string();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            let event: Option<WebhookEventModel> = dsl::webhook_events
                .filter(dsl::event_id.eq(&event_id))
                .select(WebhookEventModel::as_select())
                .first(&mut conn)
                .optional()?;

            Ok::<Option<WebhookEventModel>, anyhow::Error>(event)
        })
        .await??;

        Ok(result.map(|model| model.into()))
    }

    /// Record an event, apply its credit grant and mark it processed in one
    /// transaction.
    ///
    /// Returns None without touching any balance when the event ID is already
    /// present; the unique constraint on `event_id` decides, so concurrent
    /// deliveries of the same event cannot both get past the insert.
    pub async fn commit(
        &self,
        new_event: NewWebhookEvent,
        grant: Option<CreditGrant>,
    ) -> Result<Option<GrantOutcome>> {
        use crate::schema::webhook_events::dsl;

        let pool = self.pool.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;

            conn.transaction::<_, anyhow::Error, _>(|conn| {
                let inserted = diesel::insert_into(dsl::webhook_events)
                    .values(&new_event)
                    .on_conflict(dsl::event_id)
                    .do_nothing()
                    .execute(conn)?;

                if inserted == 0 {
                    return Ok(None);
                }

                let outcome = match grant {
                    None => GrantOutcome::NotRequested,
                    Some(grant) => match adjust_with_conn(conn, grant.account_id, grant.credits)? {
                        Some(new_balance) => GrantOutcome::Applied { new_balance },
                        None => GrantOutcome::AccountMissing,
                    },
                };

                diesel::update(dsl::webhook_events.filter(dsl::event_id.eq(&new_event.event_id)))
                    .set(dsl::processed.eq(true))
                    .execute(conn)?;

                Ok(Some(outcome))
            })
        })
        .await??;

        Ok(result)
    }
}

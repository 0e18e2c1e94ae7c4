//! Webhook reconciliation: turns subscription-renewal notifications into
//! credit grants, at most once per external event id.
//!
//! Each delivery runs to completion in one pass:
//!
//! 1. non-renewal events are acknowledged as `ignored` and not stored
//! 2. event ids already in the log are acknowledged as `already_processed`
//! 3. the event record, the grant (if the user resolves) and the processed
//!    flag are committed together by the store
//!
//! A delivery that loses a race with a concurrent copy of itself is caught
//! by the store's uniqueness guard at step 3 and reported as
//! `already_processed`, never as a second grant.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info};

use crate::credit_policy::CreditPolicy;
use crate::credit_store::CreditStore;
use crate::error::{LedgerError, LedgerResult};
use crate::revenuecat::{AppUserId, EventType, WebhookEnvelope, WebhookEvent, parse_event_timestamp};
use crate::webhook_events::{CreditGrant, GrantOutcome, NewWebhookEvent};

/// Environment recorded when the event does not name one
pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Acknowledgement returned to the webhook sender
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Ignored { event_type: Option<String> },
    AlreadyProcessed,
    Processed { event_id: String },
}

#[derive(Clone)]
pub struct WebhookReconciler {
    store: Arc<dyn CreditStore>,
    policy: CreditPolicy,
}

impl WebhookReconciler {
    pub fn new(store: Arc<dyn CreditStore>, policy: CreditPolicy) -> Self {
        Self { store, policy }
    }

    /// Parse and reconcile a raw delivery body
    pub async fn ingest(&self, payload: serde_json::Value) -> LedgerResult<WebhookOutcome> {
        metrics::counter!("webhook.received").increment(1);
        let start = Instant::now();

        let result = match WebhookEnvelope::from_value(payload) {
            Ok(envelope) => {
                info!(event_type = %envelope.event_type_label(), "Received RevenueCat webhook");
                debug!(payload = %envelope.payload, "Full webhook payload");
                self.reconcile(envelope).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(WebhookOutcome::Ignored { .. }) => {
                metrics::counter!("webhook.ignored").increment(1)
            }
            Ok(WebhookOutcome::AlreadyProcessed) => {
                metrics::counter!("webhook.already_processed").increment(1)
            }
            Ok(WebhookOutcome::Processed { .. }) => {
                metrics::counter!("webhook.processed").increment(1)
            }
            Err(e) => {
                metrics::counter!("webhook.failed").increment(1);
                error!(error = %e, "Error processing webhook");
            }
        }

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("webhook.processing_ms").record(duration_ms);

        result
    }

    pub async fn reconcile(&self, envelope: WebhookEnvelope) -> LedgerResult<WebhookOutcome> {
        let event = &envelope.event;

        if event.event_type != Some(EventType::Renewal) {
            info!(event_type = %envelope.event_type_label(), "Ignoring non-renewal event type");
            return Ok(WebhookOutcome::Ignored {
                event_type: event.event_type.clone().map(String::from),
            });
        }

        let event_id = event
            .id
            .clone()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| LedgerError::MalformedEnvelope("renewal event has no id".into()))?;

        if self.store.has_processed(&event_id).await? {
            info!(event_id = %event_id, "Event already processed");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let new_event = NewWebhookEvent {
            event_id: event_id.clone(),
            event_type: EventType::Renewal.as_str().to_string(),
            app_user_id: event.app_user_id.clone(),
            product_id: event.product_id.clone(),
            environment: event
                .environment
                .clone()
                .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            event_timestamp: parse_event_timestamp(event.event_timestamp_ms.as_ref(), Utc::now()),
            payload: envelope.payload.clone(),
        };
        let grant = self.resolve_grant(event);

        match self.store.commit_event(new_event, grant).await {
            Ok(outcome) => {
                log_grant(&event_id, event, grant, outcome);
                Ok(WebhookOutcome::Processed { event_id })
            }
            Err(LedgerError::DuplicateEvent(_)) => {
                info!(event_id = %event_id, "Event recorded by a concurrent delivery");
                Ok(WebhookOutcome::AlreadyProcessed)
            }
            Err(e) => Err(e),
        }
    }

    /// Work out which account to credit and by how much. Events without a
    /// usable user or product id are still recorded, just without a grant.
    fn resolve_grant(&self, event: &WebhookEvent) -> Option<CreditGrant> {
        let Some(product_id) = event.product_id.as_deref().filter(|p| !p.is_empty()) else {
            debug!("Renewal without product_id, skipping credit grant");
            return None;
        };

        match AppUserId::parse(event.app_user_id.as_deref()) {
            AppUserId::Valid(account_id) => Some(CreditGrant {
                account_id,
                credits: self.policy.credits_for(product_id),
            }),
            AppUserId::Unparseable(raw) => {
                error!(app_user_id = %raw, "Invalid UUID format for app_user_id");
                None
            }
            AppUserId::Missing => {
                debug!("Renewal without app_user_id, skipping credit grant");
                None
            }
        }
    }
}

fn log_grant(event_id: &str, event: &WebhookEvent, grant: Option<CreditGrant>, outcome: GrantOutcome) {
    let product_id = event.product_id.as_deref().unwrap_or_default();
    match (grant, outcome) {
        (Some(grant), GrantOutcome::Applied { new_balance }) if grant.credits == 0 => {
            info!(
                event_id = %event_id,
                user_id = %grant.account_id,
                product_id = %product_id,
                total = new_balance,
                "No credits granted for product"
            );
        }
        (Some(grant), GrantOutcome::Applied { new_balance }) => {
            metrics::counter!("webhook.credits.granted").increment(grant.credits as u64);
            info!(
                event_id = %event_id,
                user_id = %grant.account_id,
                product_id = %product_id,
                credits = grant.credits,
                total = new_balance,
                "Added renewal credits"
            );
        }
        (Some(grant), GrantOutcome::AccountMissing) => {
            error!(event_id = %event_id, user_id = %grant.account_id, "User not found");
        }
        _ => {
            info!(event_id = %event_id, "Recorded renewal without credit grant");
        }
    }
}

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Diesel model for the webhook_events table
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = crate::schema::webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct WebhookEventModel {
    pub id: i64,
    pub event_id: String,
    pub event_type: String,
    pub app_user_id: Option<String>,
    pub product_id: Option<String>,
    pub environment: String,
    pub event_timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert model for new webhook events
#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = crate::schema::webhook_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewWebhookEvent {
    pub event_id: String,
    pub event_type: String,
    pub app_user_id: Option<String>,
    pub product_id: Option<String>,
    pub environment: String,
    pub event_timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

/// API model for a recorded webhook event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub event_id: String,
    pub event_type: String,
    pub app_user_id: Option<String>,
    pub product_id: Option<String>,
    pub environment: String,
    pub event_timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
}

impl From<WebhookEventModel> for WebhookEventRecord {
    fn from(model: WebhookEventModel) -> Self {
        Self {
            event_id: model.event_id,
            event_type: model.event_type,
            app_user_id: model.app_user_id,
            product_id: model.product_id,
            environment: model.environment,
            event_timestamp: model.event_timestamp,
            payload: model.payload,
            processed: model.processed,
            created_at: model.created_at,
        }
    }
}

/// A credit mutation to apply in the same transaction as an event insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreditGrant {
    pub account_id: uuid::Uuid,
    pub credits: i32,
}

/// What happened when an event was committed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantOutcome {
    /// No grant was requested.
    NotRequested,
    /// The account was credited; carries the new balance.
    Applied { new_balance: i32 },
    /// The grant named an account that does not exist.
    AccountMissing,
}

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// API model for a credit account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub credits: i32,
    pub created_at: DateTime<Utc>,
}

/// Diesel model for the accounts table
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = crate::schema::accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AccountModel {
    pub id: Uuid,
    pub credits: i32,
    pub created_at: DateTime<Utc>,
}

/// Insert model for new accounts
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::accounts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct NewAccount {
    pub id: Uuid,
    pub credits: i32,
}

impl From<AccountModel> for Account {
    fn from(model: AccountModel) -> Self {
        Self {
            id: model.id,
            credits: model.credits,
            created_at: model.created_at,
        }
    }
}

/// Result of a conditional debit against an account balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitOutcome {
    /// The debit was applied; carries the remaining balance.
    Debited { remaining: i32 },
    /// The balance was too low; nothing changed.
    Insufficient { available: i32 },
}

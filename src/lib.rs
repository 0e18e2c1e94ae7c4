//! Vemix ledger - credit balances for video generation plus RevenueCat
//! subscription reconciliation.
//!
//! The [`ledger::Ledger`] validates and applies register/get/add/use
//! operations, and the [`reconciler::WebhookReconciler`] turns renewal
//! webhooks into idempotent credit grants. Both sit on a
//! [`credit_store::CreditStore`], backed by Postgres in production and by
//! [`memory_store::MemoryCreditStore`] for tests and local runs.

pub mod accounts;
pub mod accounts_repo;
pub mod actions;
pub mod config;
pub mod credit_policy;
pub mod credit_store;
pub mod db;
pub mod error;
pub mod ledger;
pub mod memory_store;
pub mod metrics;
pub mod reconciler;
pub mod revenuecat;
pub mod schema;
pub mod telemetry;
pub mod web;
pub mod webhook_events;
pub mod webhook_events_repo;

pub use credit_policy::CreditPolicy;
pub use credit_store::{CreditStore, PgCreditStore};
pub use error::{LedgerError, LedgerResult};
pub use ledger::Ledger;
pub use memory_store::MemoryCreditStore;
pub use reconciler::{WebhookOutcome, WebhookReconciler};

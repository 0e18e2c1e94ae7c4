mod common;

use chrono::{TimeZone, Utc};
use serde_json::json;
use serial_test::serial;
use std::sync::Arc;
use uuid::Uuid;
use vemix_ledger::credit_store::{CreditStore, PgCreditStore};
use vemix_ledger::webhook_events::NewWebhookEvent;
use vemix_ledger::{CreditPolicy, Ledger, LedgerError, WebhookOutcome, WebhookReconciler};

use common::TestDatabase;

async fn setup() -> (TestDatabase, Arc<dyn CreditStore>) {
    let test_db = TestDatabase::new()
        .await
        .expect("Failed to create test database");
    let store: Arc<dyn CreditStore> = Arc::new(PgCreditStore::new(test_db.pool()));
    (test_db, store)
}

fn renewal(event_id: &str, user_id: &str, product_id: &str) -> serde_json::Value {
    json!({
        "api_version": "1.0",
        "event": {
            "type": "RENEWAL",
            "id": event_id,
            "app_user_id": user_id,
            "product_id": product_id,
            "environment": "SANDBOX",
            "event_timestamp_ms": 1_700_000_000_000_i64
        }
    })
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_ledger_lifecycle() {
    let (_db, store) = setup().await;
    let ledger = Ledger::new(store);
    let user_id = Uuid::new_v4().to_string();

    let account = ledger.register(&user_id, 5).await.unwrap();
    assert_eq!(account.credits, 5);

    let duplicate = ledger.register(&user_id, 5).await;
    assert!(matches!(duplicate, Err(LedgerError::Conflict(_))));

    let added = ledger.add_credits(&user_id, 10).await.unwrap();
    assert_eq!(added.total_credits, 15);

    let used = ledger.use_credits(&user_id, 3).await.unwrap();
    assert_eq!(used.remaining_credits, 12);

    let insufficient = ledger.use_credits(&user_id, 13).await;
    assert!(matches!(
        insufficient,
        Err(LedgerError::InsufficientCredits {
            available: 12,
            requested: 13
        })
    ));

    assert_eq!(ledger.get(&user_id).await.unwrap().credits, 12);
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_add_past_max_is_rejected() {
    let (_db, store) = setup().await;
    let ledger = Ledger::new(store);
    let user_id = Uuid::new_v4().to_string();
    ledger.register(&user_id, 1).await.unwrap();

    let err = ledger.add_credits(&user_id, i32::MAX).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert_eq!(ledger.get(&user_id).await.unwrap().credits, 1);

    let added = ledger.add_credits(&user_id, i32::MAX - 1).await.unwrap();
    assert_eq!(added.total_credits, i32::MAX);
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_unknown_account() {
    let (_db, store) = setup().await;
    let ledger = Ledger::new(store);
    let user_id = Uuid::new_v4().to_string();

    assert!(matches!(
        ledger.get(&user_id).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        ledger.add_credits(&user_id, 1).await,
        Err(LedgerError::NotFound(_))
    ));
    assert!(matches!(
        ledger.use_credits(&user_id, 1).await,
        Err(LedgerError::NotFound(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_concurrent_debits_never_overdraw() {
    let (_db, store) = setup().await;
    let ledger = Ledger::new(store);
    let user_id = Uuid::new_v4().to_string();
    ledger.register(&user_id, 5).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let ledger = ledger.clone();
        let user_id = user_id.clone();
        handles.push(tokio::spawn(async move {
            ledger.use_credits(&user_id, 1).await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(LedgerError::InsufficientCredits { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(ledger.get(&user_id).await.unwrap().credits, 0);
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_renewal_grants_once_and_is_recorded() {
    let (_db, store) = setup().await;
    let ledger = Ledger::new(store.clone());
    let reconciler = WebhookReconciler::new(store.clone(), CreditPolicy::default());
    let user_id = Uuid::new_v4().to_string();
    ledger.register(&user_id, 0).await.unwrap();

    let payload = renewal("evt_pg_1", &user_id, "com.vemix.weekly");
    let first = reconciler.ingest(payload.clone()).await.unwrap();
    assert_eq!(
        first,
        WebhookOutcome::Processed {
            event_id: "evt_pg_1".to_string()
        }
    );

    let second = reconciler.ingest(payload).await.unwrap();
    assert_eq!(second, WebhookOutcome::AlreadyProcessed);

    assert_eq!(ledger.get(&user_id).await.unwrap().credits, 10);

    let record = store.get_event("evt_pg_1").await.unwrap().unwrap();
    assert!(record.processed);
    assert_eq!(record.event_type, "RENEWAL");
    assert_eq!(record.app_user_id.as_deref(), Some(user_id.as_str()));
    assert_eq!(record.product_id.as_deref(), Some("com.vemix.weekly"));
    assert_eq!(record.environment, "SANDBOX");
    assert_eq!(
        record.event_timestamp,
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    );
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_renewal_for_missing_account_is_still_recorded() {
    let (_db, store) = setup().await;
    let reconciler = WebhookReconciler::new(store.clone(), CreditPolicy::default());
    let user_id = Uuid::new_v4().to_string();

    let outcome = reconciler
        .ingest(renewal("evt_pg_2", &user_id, "com.vemix.yearly"))
        .await
        .unwrap();

    assert!(matches!(outcome, WebhookOutcome::Processed { .. }));
    assert!(store.has_processed("evt_pg_2").await.unwrap());
    assert!(store.get(user_id.parse().unwrap()).await.unwrap().is_none());
}

#[tokio::test]
#[serial]
#[ignore] // Requires PostgreSQL
async fn test_duplicate_commit_is_rejected() {
    let (_db, store) = setup().await;

    let new_event = || NewWebhookEvent {
        event_id: "evt_pg_dup".to_string(),
        event_type: "RENEWAL".to_string(),
        app_user_id: None,
        product_id: None,
        environment: "production".to_string(),
        event_timestamp: Utc::now(),
        payload: json!({}),
    };

    store.commit_event(new_event(), None).await.unwrap();
    let duplicate = store.commit_event(new_event(), None).await;

    assert!(matches!(duplicate, Err(LedgerError::DuplicateEvent(id)) if id == "evt_pg_dup"));
}

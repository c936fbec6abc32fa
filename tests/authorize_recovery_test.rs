mod common;

use common::{FlakyStore, Harness, SECRET};
use paypoll::config::EngineConfig;
use paypoll::domain::clock::{ClockHandle, ManualClock};
use paypoll::domain::transaction::TransactionStatus;
use paypoll::error::ErrorKind;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn flaky_harness() -> (Harness, FlakyStore) {
    let clock = ManualClock::default();
    let handle: ClockHandle = Arc::new(clock.clone());
    let store = FlakyStore::new(handle);
    let h = Harness::assemble(EngineConfig::new(SECRET), Box::new(store.clone()), clock);
    (h, store)
}

#[tokio::test]
async fn test_failed_settle_leaves_authorized() {
    let (h, store) = flaky_harness();
    let created = h.create(dec!(100), dec!(1)).await;
    h.engine.confirm(&created.tx_id, &h.pos).await.unwrap();

    store.fail_next_settle();
    let err = h.engine.authorize(&created.tx_id, &h.pos).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InternalError);

    let snapshot = h.engine.status(&created.tx_id, &h.pos).await.unwrap();
    assert_eq!(snapshot.transaction.status, TransactionStatus::Authorized);
    // Neither list shows an in-between record.
    assert!(h.engine.list_ready(&h.pos).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_retry_completes_settlement() {
    let (h, store) = flaky_harness();
    let created = h.create(dec!(100), dec!(1)).await;
    h.engine.confirm(&created.tx_id, &h.pos).await.unwrap();

    store.fail_next_settle();
    h.engine.authorize(&created.tx_id, &h.pos).await.unwrap_err();

    let status = h.engine.authorize(&created.tx_id, &h.pos).await.unwrap();
    assert_eq!(status, TransactionStatus::Settled);

    let err = h.engine.authorize(&created.tx_id, &h.pos).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);
}

#[tokio::test]
async fn test_authorizing_caller_wins_against_a_concurrent_retry() {
    let (h, store) = flaky_harness();
    let created = h.create(dec!(100), dec!(1)).await;
    h.engine.confirm(&created.tx_id, &h.pos).await.unwrap();

    store.hold_next_settle();
    let first = {
        let engine = h.engine.clone();
        let token = h.pos.clone();
        let id = created.tx_id;
        tokio::spawn(async move { engine.authorize(&id, &token).await })
    };
    // The first call has written AUTHORIZED and is parked on the settle write.
    store.settle_reached().await;

    let second = {
        let engine = h.engine.clone();
        let token = h.pos.clone();
        let id = created.tx_id;
        tokio::spawn(async move { engine.authorize(&id, &token).await })
    };
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    store.release_settle();

    assert_eq!(first.await.unwrap().unwrap(), TransactionStatus::Settled);
    let err = second.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidTransition);

    let snapshot = h.engine.status(&created.tx_id, &h.pos).await.unwrap();
    assert_eq!(snapshot.transaction.status, TransactionStatus::Settled);
}

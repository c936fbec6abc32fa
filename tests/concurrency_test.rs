mod common;

use common::Harness;
use paypoll::domain::transaction::TransactionStatus;
use paypoll::error::ErrorKind;
use rust_decimal_macros::dec;

const CALLERS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirm_succeeds_once() {
    let h = Harness::new();
    let created = h.create(dec!(10), dec!(0)).await;

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let engine = h.engine.clone();
        let token = h.pos.clone();
        let id = created.tx_id;
        handles.push(tokio::spawn(async move { engine.confirm(&id, &token).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(status) => {
                assert_eq!(status, TransactionStatus::ReadyForAuth);
                successes += 1;
            }
            Err(e) => assert_eq!(e.kind(), ErrorKind::InvalidTransition),
        }
    }
    assert_eq!(successes, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_authorize_settles_once() {
    let h = Harness::new();
    let created = h.create(dec!(10), dec!(0)).await;
    h.engine.confirm(&created.tx_id, &h.pos).await.unwrap();

    let mut handles = Vec::with_capacity(CALLERS);
    for _ in 0..CALLERS {
        let engine = h.engine.clone();
        let token = h.pos.clone();
        let id = created.tx_id;
        handles.push(tokio::spawn(async move { engine.authorize(&id, &token).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(status) => {
                assert_eq!(status, TransactionStatus::Settled);
                successes += 1;
            }
            Err(e) => assert_eq!(e.kind(), ErrorKind::InvalidTransition),
        }
    }
    assert_eq!(successes, 1);

    let snapshot = h.engine.status(&created.tx_id, &h.pos).await.unwrap();
    assert_eq!(snapshot.transaction.status, TransactionStatus::Settled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_lists_only_hold_their_status_under_load() {
    let h = Harness::new();
    let mut ids = Vec::new();
    for i in 1..=20 {
        ids.push(h.create(dec!(1) * rust_decimal::Decimal::from(i), dec!(0)).await.tx_id);
    }

    let confirmer = {
        let engine = h.engine.clone();
        let token = h.pos.clone();
        let ids = ids.clone();
        tokio::spawn(async move {
            for id in ids.iter().step_by(2) {
                engine.confirm(id, &token).await.unwrap();
            }
        })
    };

    for _ in 0..10 {
        for snapshot in h.engine.list_pending(&h.pos).await.unwrap() {
            assert_eq!(snapshot.transaction.status, TransactionStatus::Waiting);
        }
        for snapshot in h.engine.list_ready(&h.pos).await.unwrap() {
            assert_eq!(snapshot.transaction.status, TransactionStatus::ReadyForAuth);
        }
        tokio::task::yield_now().await;
    }
    confirmer.await.unwrap();

    assert_eq!(h.engine.list_pending(&h.pos).await.unwrap().len(), 10);
    assert_eq!(h.engine.list_ready(&h.pos).await.unwrap().len(), 10);
}

#![allow(dead_code)]

use async_trait::async_trait;
use paypoll::application::engine::{CreatedTransaction, NewTransaction, TransactionEngine};
use paypoll::config::EngineConfig;
use paypoll::domain::clock::{ClockHandle, ManualClock};
use paypoll::domain::ports::{LedgerStore, LedgerStoreBox, TransactionFilter, Transition};
use paypoll::domain::transaction::{Transaction, TransactionId, TransactionStatus};
use paypoll::error::{PaymentError, Result};
use paypoll::infrastructure::in_memory::InMemoryLedgerStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

pub const SECRET: &str = "integration-secret";

/// An engine over an in-memory ledger with a manual clock and one token per role.
pub struct Harness {
    pub engine: Arc<TransactionEngine>,
    pub clock: ManualClock,
    pub client: String,
    pub pos: String,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::new(SECRET))
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let clock = ManualClock::default();
        let handle: ClockHandle = Arc::new(clock.clone());
        let store = InMemoryLedgerStore::new(handle.clone());
        Self::assemble(config, Box::new(store), clock)
    }

    pub fn assemble(config: EngineConfig, store: LedgerStoreBox, clock: ManualClock) -> Self {
        let engine = TransactionEngine::new(config, store, Arc::new(clock.clone())).unwrap();
        let client = engine.issue_token("alice", Some("client")).unwrap().token;
        let pos = engine.issue_token("pos-terminal-1", Some("pos")).unwrap().token;
        Self {
            engine: Arc::new(engine),
            clock,
            client,
            pos,
        }
    }

    pub async fn create(&self, amount: Decimal, buyer_float_percent: Decimal) -> CreatedTransaction {
        self.engine
            .create(
                &self.client,
                NewTransaction {
                    source: "alice".to_string(),
                    destination: "coffee-shop".to_string(),
                    amount,
                    buyer_float_percent: Some(buyer_float_percent),
                },
            )
            .await
            .unwrap()
    }
}

/// Wraps the in-memory ledger and fails selected operations on demand.
#[derive(Clone)]
pub struct FlakyStore {
    inner: InMemoryLedgerStore,
    fail_next_settle: Arc<AtomicBool>,
    hold_next_settle: Arc<AtomicBool>,
    settle_reached: Arc<Notify>,
    settle_released: Arc<Notify>,
    down: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn new(clock: ClockHandle) -> Self {
        Self {
            inner: InMemoryLedgerStore::new(clock),
            fail_next_settle: Arc::new(AtomicBool::new(false)),
            hold_next_settle: Arc::new(AtomicBool::new(false)),
            settle_reached: Arc::new(Notify::new()),
            settle_released: Arc::new(Notify::new()),
            down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fail_next_settle(&self) {
        self.fail_next_settle.store(true, Ordering::SeqCst);
    }

    /// Parks the next settle write until [`FlakyStore::release_settle`].
    pub fn hold_next_settle(&self) {
        self.hold_next_settle.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held settle write is parked.
    pub async fn settle_reached(&self) {
        self.settle_reached.notified().await;
    }

    pub fn release_settle(&self) {
        self.settle_released.notify_one();
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(PaymentError::StoreUnavailable("ledger offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl LedgerStore for FlakyStore {
    async fn put(&self, tx: Transaction) -> Result<()> {
        self.check()?;
        self.inner.put(tx).await
    }

    async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        self.check()?;
        self.inner.get(id).await
    }

    async fn find(&self, filter: TransactionFilter<'_>) -> Result<Vec<Transaction>> {
        self.check()?;
        self.inner.find(filter).await
    }

    async fn delete(&self, id: &TransactionId) -> Result<bool> {
        self.check()?;
        self.inner.delete(id).await
    }

    async fn transition(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<Transition> {
        self.check()?;
        if next == TransactionStatus::Settled && self.fail_next_settle.swap(false, Ordering::SeqCst) {
            return Err(PaymentError::StoreUnavailable("write timed out".to_string()));
        }
        if next == TransactionStatus::Settled && self.hold_next_settle.swap(false, Ordering::SeqCst) {
            self.settle_reached.notify_one();
            self.settle_released.notified().await;
        }
        self.inner.transition(id, expected, next).await
    }
}

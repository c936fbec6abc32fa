use crate::domain::clock::ClockHandle;
use crate::domain::ports::{LedgerStore, TransactionFilter, Transition};
use crate::domain::transaction::{Transaction, TransactionId, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// A thread-safe in-memory ledger.
///
/// Uses `Arc<RwLock<HashMap<TransactionId, Transaction>>>` to allow shared
/// concurrent access. Expired records are hidden from every read and dropped by
/// [`InMemoryLedgerStore::purge_expired`] or the background reaper.
#[derive(Clone)]
pub struct InMemoryLedgerStore {
    transactions: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
    clock: ClockHandle,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger using `clock` for expiry.
    pub fn new(clock: ClockHandle) -> Self {
        Self {
            transactions: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Removes every record past its deadline and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut transactions = self.transactions.write().await;
        let before = transactions.len();
        transactions.retain(|_, tx| !tx.is_expired_at(now));
        before - transactions.len()
    }

    /// Spawns a task that purges expired records every `every`.
    ///
    /// The task runs until the returned handle is aborted.
    pub fn spawn_reaper(&self, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let purged = store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "expired transactions purged");
                }
            }
        })
    }

    /// Number of records held, including expired ones not yet purged.
    pub async fn len(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn put(&self, tx: Transaction) -> Result<()> {
        let mut transactions = self.transactions.write().await;
        transactions.insert(tx.id, tx);
        Ok(())
    }

    async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        let now = self.clock.now();
        let transactions = self.transactions.read().await;
        Ok(transactions
            .get(id)
            .filter(|tx| !tx.is_expired_at(now))
            .cloned())
    }

    async fn find(&self, filter: TransactionFilter<'_>) -> Result<Vec<Transaction>> {
        let now = self.clock.now();
        let transactions = self.transactions.read().await;
        let mut found: Vec<Transaction> = transactions
            .values()
            .filter(|tx| !tx.is_expired_at(now) && filter(*tx))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn delete(&self, id: &TransactionId) -> Result<bool> {
        let now = self.clock.now();
        let mut transactions = self.transactions.write().await;
        match transactions.remove(id) {
            Some(tx) => Ok(!tx.is_expired_at(now)),
            None => Ok(false),
        }
    }

    async fn transition(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<Transition> {
        let now = self.clock.now();
        let mut transactions = self.transactions.write().await;
        let Some(tx) = transactions.get_mut(id).filter(|tx| !tx.is_expired_at(now)) else {
            return Ok(Transition::Missing);
        };
        if tx.status != expected {
            return Ok(Transition::Conflict(tx.status));
        }
        tx.status = next;
        Ok(Transition::Applied(tx.clone()))
    }
}

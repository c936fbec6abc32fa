use super::charges::Percent;
use super::transaction::{Transaction, TransactionId, TransactionStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Predicate applied by [`LedgerStore::find`].
pub type TransactionFilter<'a> = &'a (dyn Fn(&Transaction) -> bool + Send + Sync);

/// Outcome of a compare-and-transition on a stored record's status.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The status matched and was replaced; carries the updated record.
    Applied(Transaction),
    /// The status did not match; carries what the store actually holds.
    Conflict(TransactionStatus),
    /// No live record with that id.
    Missing,
}

/// Keyed record store for transactions with a time-to-live policy.
///
/// Implementations must never return a record past its `ttl_expires_at`, and a
/// read must observe a record exactly as one prior write left it.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn put(&self, tx: Transaction) -> Result<()>;
    async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>>;
    /// Live records matching `filter`, most recently created first.
    async fn find(&self, filter: TransactionFilter<'_>) -> Result<Vec<Transaction>>;
    async fn delete(&self, id: &TransactionId) -> Result<bool>;
    /// Atomically moves `id` from `expected` to `next`. Concurrent callers with the
    /// same `expected` status see exactly one `Applied`.
    async fn transition(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<Transition>;
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

/// External source of the sojor rate applied to new transactions.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn sojor_percent(&self) -> Result<Percent>;
}

pub type RateSourceBox = Box<dyn RateSource>;

/// A rate source that always answers the same value.
#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub Percent);

#[async_trait]
impl RateSource for FixedRate {
    async fn sojor_percent(&self) -> Result<Percent> {
        Ok(self.0)
    }
}

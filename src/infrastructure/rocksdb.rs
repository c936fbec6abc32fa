use crate::domain::clock::ClockHandle;
use crate::domain::ports::{LedgerStore, TransactionFilter, Transition};
use crate::domain::transaction::{Transaction, TransactionId, TransactionStatus};
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for storing transaction records.
pub const CF_TRANSACTIONS: &str = "transactions";

/// A persistent ledger implementation using RocksDB.
///
/// Records are stored as JSON keyed by the raw transaction id bytes. Expired
/// records are filtered on read and deleted lazily when encountered.
///
/// Writes are serialized through a lock so that compare-and-transition is atomic
/// for every clone sharing the same handle.
#[derive(Clone)]
pub struct RocksDBLedgerStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
    clock: ClockHandle,
}

impl RocksDBLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// # Arguments
    ///
    /// * `path` - The filesystem path where the database will be stored.
    /// * `clock` - Time source for the expiry policy.
    pub fn open<P: AsRef<Path>>(path: P, clock: ClockHandle) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_transactions = ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_transactions])?;

        let store = Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
            clock,
        };
        // No other handle exists yet, so the sweep needs no lock.
        let purged = store.sweep()?;
        if purged > 0 {
            tracing::debug!(purged, "expired transactions purged on open");
        }
        Ok(store)
    }

    /// Deletes every expired record and returns how many were dropped.
    pub async fn purge_expired(&self) -> Result<usize> {
        let _guard = self.write_lock.lock().await;
        self.sweep()
    }

    fn sweep(&self) -> Result<usize> {
        let now = self.clock.now();
        let cf = self.cf()?;
        let mut purged = 0;
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (key, value) = item?;
            let tx: Transaction = serde_json::from_slice(&value)?;
            if tx.is_expired_at(now) {
                self.db.delete_cf(cf, key)?;
                purged += 1;
            }
        }
        Ok(purged)
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_TRANSACTIONS)
            .ok_or_else(|| PaymentError::internal("transactions column family not found"))
    }

    fn read(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        let cf = self.cf()?;
        match self.db.get_cf(cf, id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write(&self, tx: &Transaction) -> Result<()> {
        let cf = self.cf()?;
        let value = serde_json::to_vec(tx)?;
        self.db.put_cf(cf, tx.id.as_bytes(), value)?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for RocksDBLedgerStore {
    async fn put(&self, tx: Transaction) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(&tx)
    }

    async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        let now = self.clock.now();
        Ok(self.read(id)?.filter(|tx| !tx.is_expired_at(now)))
    }

    async fn find(&self, filter: TransactionFilter<'_>) -> Result<Vec<Transaction>> {
        let now = self.clock.now();
        let cf = self.cf()?;
        let mut found = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            let tx: Transaction = serde_json::from_slice(&value)?;
            if !tx.is_expired_at(now) && filter(&tx) {
                found.push(tx);
            }
        }
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }

    async fn delete(&self, id: &TransactionId) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let Some(tx) = self.read(id)? else {
            return Ok(false);
        };
        self.db.delete_cf(self.cf()?, id.as_bytes())?;
        Ok(!tx.is_expired_at(now))
    }

    async fn transition(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<Transition> {
        let _guard = self.write_lock.lock().await;
        let now = self.clock.now();
        let Some(mut tx) = self.read(id)?.filter(|tx| !tx.is_expired_at(now)) else {
            return Ok(Transition::Missing);
        };
        if tx.status != expected {
            return Ok(Transition::Conflict(tx.status));
        }
        tx.status = next;
        self.write(&tx)?;
        Ok(Transition::Applied(tx))
    }
}

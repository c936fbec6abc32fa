use crate::application::issuer::{IssuedToken, TokenIssuer};
use crate::config::EngineConfig;
use crate::domain::charges::{Amount, Percent};
use crate::domain::clock::ClockHandle;
use crate::domain::ports::{FixedRate, LedgerStoreBox, RateSourceBox, Transition};
use crate::domain::token::{Capability, Role, RoleSource, TokenClaims};
use crate::domain::transaction::{
    Transaction, TransactionId, TransactionSnapshot, TransactionStatus,
};
use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Input of [`TransactionEngine::create`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTransaction {
    pub source: String,
    pub destination: String,
    pub amount: Decimal,
    #[serde(default)]
    pub buyer_float_percent: Option<Decimal>,
}

/// What the creating client gets back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedTransaction {
    pub tx_id: TransactionId,
    /// Transaction-scoped token for polling this transaction only.
    pub tx_token: String,
    pub grand_total: Decimal,
    #[serde(rename = "imageRef")]
    pub preview_ref: String,
    pub sojor_percent: Decimal,
    pub buyer_float_percent: Decimal,
    pub status: TransactionStatus,
    pub ttl_seconds: u64,
}

/// Owns the transaction lifecycle.
///
/// Every operation verifies its token, checks the role and validates input before
/// touching the store. Status changes go through [`LedgerStore::transition`], so the
/// persisted status is the only concurrency control.
///
/// [`LedgerStore::transition`]: crate::domain::ports::LedgerStore::transition
pub struct TransactionEngine {
    config: EngineConfig,
    issuer: TokenIssuer,
    store: LedgerStoreBox,
    rates: RateSourceBox,
    clock: ClockHandle,
    /// One lock per transaction being authorized, so both writes of a settle
    /// finish before another `authorize` on the same id starts.
    settling: Mutex<HashMap<TransactionId, Arc<Mutex<()>>>>,
}

impl TransactionEngine {
    /// Creates a new `TransactionEngine`.
    ///
    /// # Arguments
    ///
    /// * `config` - Secret, TTLs and policy switches.
    /// * `store` - The ledger the engine reads and mutates.
    /// * `clock` - Time source shared with the store's expiry policy.
    pub fn new(config: EngineConfig, store: LedgerStoreBox, clock: ClockHandle) -> Result<Self> {
        config.validate()?;
        if config.uses_dev_secret() {
            tracing::warn!("using the built-in development token secret");
        }
        let issuer = TokenIssuer::new(&config, clock.clone());
        let rates: RateSourceBox = Box::new(FixedRate(config.sojor_percent));
        Ok(Self {
            config,
            issuer,
            store,
            rates,
            clock,
            settling: Mutex::new(HashMap::new()),
        })
    }

    pub fn issue_token(&self, subject: &str, role: Option<&str>) -> Result<IssuedToken> {
        self.issuer.issue(subject, role)
    }

    /// Returns the verified claims of any token.
    pub fn whoami(&self, token: &str) -> Result<TokenClaims> {
        self.issuer.decode(token)
    }

    /// Creates a transaction in `WAITING` on behalf of a client.
    pub async fn create(&self, token: &str, request: NewTransaction) -> Result<CreatedTransaction> {
        let capability = self.issuer.verify(token)?;
        let owner = self.require_role(&capability, Role::Client, "create")?;

        let source = non_empty("source", &request.source)?;
        let destination = non_empty("destination", &request.destination)?;
        let amount = Amount::new(request.amount)?;
        let buyer_float_percent = Percent::new(request.buyer_float_percent.unwrap_or_default())
            .map_err(|_| {
                PaymentError::ValidationError("buyerFloatPercent must be >= 0".to_string())
            })?;
        let sojor_percent = self.rates.sojor_percent().await?;

        let id = TransactionId::new();
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(self.config.transaction_ttl)
            .map_err(|e| PaymentError::InternalError(Box::new(e)))?;
        let tx = Transaction {
            id,
            source,
            destination,
            amount,
            buyer_float_percent,
            sojor_percent,
            status: TransactionStatus::Waiting,
            created_at: now,
            ttl_expires_at: now + ttl,
            owner_subject_id: owner,
            preview_ref: format!("{}?tx={}", self.config.preview_base, id),
        };
        let charges = tx.charges()?;
        let tx_token = self.issuer.issue_for_transaction(id)?;

        self.store.put(tx.clone()).await?;
        tracing::info!(tx_id = %id, owner = %tx.owner_subject_id, grand_total = %charges.grand_total, "transaction created");

        Ok(CreatedTransaction {
            tx_id: id,
            tx_token: tx_token.token,
            grand_total: charges.grand_total,
            preview_ref: tx.preview_ref,
            sojor_percent: sojor_percent.value(),
            buyer_float_percent: buyer_float_percent.value(),
            status: tx.status,
            ttl_seconds: self.config.transaction_ttl.as_secs(),
        })
    }

    /// Reads one transaction with freshly computed charges.
    ///
    /// Accepts any role token, or the transaction-scoped token of `id`.
    pub async fn status(&self, id: &TransactionId, token: &str) -> Result<TransactionSnapshot> {
        let capability = self.issuer.verify(token)?;
        if !capability.can_read(id) {
            return Err(PaymentError::Unauthorized(
                "token is scoped to another transaction".to_string(),
            ));
        }
        let tx = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))?;
        tx.snapshot()
    }

    /// All live transactions in `status`, most recent first. POS only.
    pub async fn list_by_status(
        &self,
        status: TransactionStatus,
        token: &str,
    ) -> Result<Vec<TransactionSnapshot>> {
        let capability = self.issuer.verify(token)?;
        self.require_role(&capability, Role::Pos, "list")?;
        let found = self.store.find(&|tx: &Transaction| tx.status == status).await?;
        found.iter().map(Transaction::snapshot).collect()
    }

    pub async fn list_pending(&self, token: &str) -> Result<Vec<TransactionSnapshot>> {
        self.list_by_status(TransactionStatus::Waiting, token).await
    }

    pub async fn list_ready(&self, token: &str) -> Result<Vec<TransactionSnapshot>> {
        self.list_by_status(TransactionStatus::ReadyForAuth, token)
            .await
    }

    /// POS confirmation: `WAITING` -> `READY_FOR_AUTH`. Succeeds at most once.
    pub async fn confirm(&self, id: &TransactionId, token: &str) -> Result<TransactionStatus> {
        let capability = self.issuer.verify(token)?;
        let subject = self.require_role(&capability, Role::Pos, "confirm")?;

        let next = TransactionStatus::ReadyForAuth;
        self.expect_applied(id, TransactionStatus::Waiting, next)
            .await?;
        tracing::info!(tx_id = %id, pos = %subject, "transaction confirmed");
        Ok(next)
    }

    /// POS authorization: `READY_FOR_AUTH` -> `AUTHORIZED` -> `SETTLED`.
    ///
    /// The two writes look like one transition to callers. If the settle write
    /// fails the record stays `AUTHORIZED` and the caller gets `InternalError`;
    /// calling `authorize` again picks up from `AUTHORIZED` and finishes the settle.
    /// Calls for the same id run one at a time on this engine, so the caller that
    /// performed the authorize write is the one told it succeeded.
    pub async fn authorize(&self, id: &TransactionId, token: &str) -> Result<TransactionStatus> {
        let capability = self.issuer.verify(token)?;
        let subject = self.require_role(&capability, Role::Pos, "authorize")?;

        let lock = self.settle_lock(id).await;
        let outcome = {
            let _guard = lock.lock().await;
            self.authorize_and_settle(id, &subject).await
        };
        self.release_settle_lock(id, lock).await;
        outcome
    }

    async fn authorize_and_settle(
        &self,
        id: &TransactionId,
        subject: &str,
    ) -> Result<TransactionStatus> {
        let authorized_here = match self
            .store
            .transition(
                id,
                TransactionStatus::ReadyForAuth,
                TransactionStatus::Authorized,
            )
            .await?
        {
            Transition::Applied(_) => {
                tracing::info!(tx_id = %id, pos = %subject, "transaction authorized");
                true
            }
            Transition::Conflict(TransactionStatus::Authorized) => {
                tracing::warn!(tx_id = %id, pos = %subject, "resuming settlement of an authorized transaction");
                false
            }
            Transition::Conflict(current) => {
                return Err(invalid_transition(current, "AUTHORIZED/SETTLED"));
            }
            Transition::Missing => return Err(PaymentError::NotFound(id.to_string())),
        };

        match self
            .store
            .transition(id, TransactionStatus::Authorized, TransactionStatus::Settled)
            .await
        {
            Ok(Transition::Applied(_)) => {
                tracing::info!(tx_id = %id, pos = %subject, "transaction settled");
                Ok(TransactionStatus::Settled)
            }
            // A concurrent resumer settled the record this call authorized.
            Ok(Transition::Conflict(TransactionStatus::Settled)) if authorized_here => {
                Ok(TransactionStatus::Settled)
            }
            Ok(Transition::Conflict(current)) => {
                Err(invalid_transition(current, TransactionStatus::Settled))
            }
            Ok(Transition::Missing) => Err(PaymentError::NotFound(id.to_string())),
            Err(e) => {
                tracing::warn!(tx_id = %id, error = %e, "settlement failed; transaction left AUTHORIZED");
                Err(PaymentError::InternalError(
                    format!("transaction {id} authorized but not settled: {e}").into(),
                ))
            }
        }
    }

    /// Withdraws a transaction that has not been authorized yet.
    ///
    /// Allowed for the owning client or the holder of the transaction's own token.
    pub async fn cancel(&self, id: &TransactionId, token: &str) -> Result<TransactionStatus> {
        let capability = self.issuer.verify(token)?;
        let tx = match &capability {
            Capability::Transaction(scoped) if scoped == id => self.get_live(id).await?,
            Capability::Transaction(_) => {
                return Err(PaymentError::Unauthorized(
                    "token is scoped to another transaction".to_string(),
                ));
            }
            Capability::Role { .. } => {
                let subject = self.require_role(&capability, Role::Client, "cancel")?;
                let tx = self.get_live(id).await?;
                if tx.owner_subject_id != subject {
                    return Err(PaymentError::Forbidden(
                        "only the creating client may cancel".to_string(),
                    ));
                }
                tx
            }
        };

        let next = TransactionStatus::Cancelled;
        let mut expected = tx.status;
        loop {
            if !matches!(
                expected,
                TransactionStatus::Waiting | TransactionStatus::ReadyForAuth
            ) {
                return Err(invalid_transition(expected, next));
            }
            match self.store.transition(id, expected, next).await? {
                Transition::Applied(_) => break,
                // Raced with a confirm; retry against the status actually stored.
                Transition::Conflict(current) => expected = current,
                Transition::Missing => return Err(PaymentError::NotFound(id.to_string())),
            }
        }
        tracing::info!(tx_id = %id, "transaction cancelled");
        Ok(next)
    }

    /// Deletes a transaction.
    ///
    /// Needs no token unless `clear_requires_auth` is configured, in which case a
    /// POS role token is required.
    pub async fn clear(&self, id: &TransactionId, token: Option<&str>) -> Result<()> {
        if self.config.clear_requires_auth {
            let token = token.ok_or_else(|| {
                PaymentError::Unauthorized("authorization required".to_string())
            })?;
            let capability = self.issuer.verify(token)?;
            self.require_role(&capability, Role::Pos, "clear")?;
        }

        if self.store.delete(id).await? {
            tracing::info!(tx_id = %id, "transaction cleared");
            Ok(())
        } else {
            Err(PaymentError::NotFound(id.to_string()))
        }
    }

    async fn settle_lock(&self, id: &TransactionId) -> Arc<Mutex<()>> {
        let mut settling = self.settling.lock().await;
        settling.entry(*id).or_default().clone()
    }

    async fn release_settle_lock(&self, id: &TransactionId, lock: Arc<Mutex<()>>) {
        let mut settling = self.settling.lock().await;
        drop(lock);
        if settling
            .get(id)
            .is_some_and(|held| Arc::strong_count(held) == 1)
        {
            settling.remove(id);
        }
    }

    async fn get_live(&self, id: &TransactionId) -> Result<Transaction> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))
    }

    async fn expect_applied(
        &self,
        id: &TransactionId,
        expected: TransactionStatus,
        next: TransactionStatus,
    ) -> Result<Transaction> {
        match self.store.transition(id, expected, next).await? {
            Transition::Applied(tx) => Ok(tx),
            Transition::Conflict(current) => Err(invalid_transition(current, next)),
            Transition::Missing => Err(PaymentError::NotFound(id.to_string())),
        }
    }

    /// Checks that `capability` carries `role` and returns its subject.
    fn require_role(&self, capability: &Capability, role: Role, operation: &str) -> Result<String> {
        match capability {
            Capability::Role {
                subject,
                role: held,
                source,
            } if *held == role => {
                if *source == RoleSource::Inferred {
                    tracing::warn!(subject = %subject, %role, operation, "role guard satisfied by an inferred role");
                    if self.config.strict_roles {
                        return Err(PaymentError::Forbidden(format!(
                            "{operation} requires an explicitly issued {role} role"
                        )));
                    }
                }
                Ok(subject.clone())
            }
            _ => Err(PaymentError::Unauthorized(format!(
                "{operation} requires {role} role"
            ))),
        }
    }
}

fn non_empty(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(PaymentError::ValidationError(format!("{field} required")))
    } else {
        Ok(trimmed.to_string())
    }
}

fn invalid_transition(from: TransactionStatus, to: impl ToString) -> PaymentError {
    PaymentError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
    }
}

use crate::domain::charges::{Amount, Charges, Percent};
use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique transaction identifier, generated at creation and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(Uuid);

impl TransactionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TransactionId {
    type Err = PaymentError;

    // An unparseable id can never match a record.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| PaymentError::NotFound(s.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Clone, Copy, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Schema default; the creation path never produces it.
    #[default]
    Pending,
    Waiting,
    ReadyForAuth,
    Authorized,
    Settled,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "PENDING",
            TransactionStatus::Waiting => "WAITING",
            TransactionStatus::ReadyForAuth => "READY_FOR_AUTH",
            TransactionStatus::Authorized => "AUTHORIZED",
            TransactionStatus::Settled => "SETTLED",
            TransactionStatus::Cancelled => "CANCELLED",
        }
    }

    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Settled | TransactionStatus::Cancelled
        )
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(TransactionStatus::Pending),
            "WAITING" => Ok(TransactionStatus::Waiting),
            "READY_FOR_AUTH" => Ok(TransactionStatus::ReadyForAuth),
            "AUTHORIZED" => Ok(TransactionStatus::Authorized),
            "SETTLED" => Ok(TransactionStatus::Settled),
            "CANCELLED" => Ok(TransactionStatus::Cancelled),
            other => Err(PaymentError::ValidationError(format!(
                "unknown status: {other}"
            ))),
        }
    }
}

/// A persisted point-of-sale transaction.
///
/// Only the economic inputs are stored; charges are derived through
/// [`Transaction::snapshot`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: TransactionId,
    pub source: String,
    pub destination: String,
    pub amount: Amount,
    pub buyer_float_percent: Percent,
    pub sojor_percent: Percent,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
    pub ttl_expires_at: DateTime<Utc>,
    /// Creator of the transaction. Kept for audit only.
    pub owner_subject_id: String,
    /// Opaque display asset reference, fixed at creation.
    pub preview_ref: String,
}

impl Transaction {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.ttl_expires_at
    }

    pub fn charges(&self) -> Result<Charges, PaymentError> {
        Charges::compute(self.amount, self.buyer_float_percent, self.sojor_percent)
    }

    /// Read view with freshly computed charges.
    pub fn snapshot(&self) -> Result<TransactionSnapshot, PaymentError> {
        Ok(TransactionSnapshot {
            charges: self.charges()?,
            transaction: self.clone(),
        })
    }
}

/// What readers observe: the stored record plus its derived charges.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct TransactionSnapshot {
    #[serde(flatten)]
    pub transaction: Transaction,
    #[serde(flatten)]
    pub charges: Charges,
}

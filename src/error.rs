use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

/// Errors surfaced by the token issuer, the transaction engine and the stores.
///
/// Every variant maps to one stable [`ErrorKind`]; nothing is retried internally.
#[derive(Error, Debug, Diagnostic)]
pub enum PaymentError {
    #[error("invalid role: {0}")]
    #[diagnostic(code(paypoll::invalid_role))]
    InvalidRole(String),

    #[error("invalid token: {0}")]
    #[diagnostic(code(paypoll::token_invalid))]
    TokenInvalid(String),

    #[error("token expired")]
    #[diagnostic(code(paypoll::token_expired), help("request a new token"))]
    TokenExpired,

    #[error("unauthorized: {0}")]
    #[diagnostic(code(paypoll::unauthorized))]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    #[diagnostic(code(paypoll::forbidden))]
    Forbidden(String),

    #[error("validation error: {0}")]
    #[diagnostic(code(paypoll::validation))]
    ValidationError(String),

    #[error("transaction not found: {0}")]
    #[diagnostic(code(paypoll::not_found))]
    NotFound(String),

    #[error("invalid status transition: {from} -> {to}")]
    #[diagnostic(code(paypoll::invalid_transition))]
    InvalidTransition { from: String, to: String },

    #[error("store unavailable: {0}")]
    #[diagnostic(code(paypoll::store_unavailable))]
    StoreUnavailable(String),

    #[error("internal error: {0}")]
    #[diagnostic(code(paypoll::internal))]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

/// Stable, machine-readable error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRole,
    TokenInvalid,
    TokenExpired,
    Unauthorized,
    Forbidden,
    ValidationError,
    NotFound,
    InvalidTransition,
    StoreUnavailable,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRole => "InvalidRole",
            ErrorKind::TokenInvalid => "TokenInvalid",
            ErrorKind::TokenExpired => "TokenExpired",
            ErrorKind::Unauthorized => "Unauthorized",
            ErrorKind::Forbidden => "Forbidden",
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::InvalidTransition => "InvalidTransition",
            ErrorKind::StoreUnavailable => "StoreUnavailable",
            ErrorKind::InternalError => "InternalError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::InvalidRole(_) => ErrorKind::InvalidRole,
            PaymentError::TokenInvalid(_) => ErrorKind::TokenInvalid,
            PaymentError::TokenExpired => ErrorKind::TokenExpired,
            PaymentError::Unauthorized(_) => ErrorKind::Unauthorized,
            PaymentError::Forbidden(_) => ErrorKind::Forbidden,
            PaymentError::ValidationError(_) => ErrorKind::ValidationError,
            PaymentError::NotFound(_) => ErrorKind::NotFound,
            PaymentError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            PaymentError::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            PaymentError::InternalError(_) => ErrorKind::InternalError,
        }
    }

    /// Wraps any message as an [`PaymentError::InternalError`].
    pub fn internal(msg: impl Into<String>) -> Self {
        PaymentError::InternalError(Box::new(std::io::Error::other(msg.into())))
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        PaymentError::InternalError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for PaymentError {
    fn from(err: rocksdb::Error) -> Self {
        PaymentError::StoreUnavailable(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;

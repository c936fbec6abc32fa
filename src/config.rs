use crate::domain::charges::Percent;
use crate::error::{PaymentError, Result};
use rust_decimal_macros::dec;
use std::time::Duration;

/// Secret used when none is configured. Only suitable for local demos.
pub const DEV_SECRET: &str = "dev_secret";
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_PREVIEW_BASE: &str = "/api/preview-image";

/// Settings shared by the token issuer and the transaction engine.
///
/// Passed in at construction time; nothing here is process-global.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// HMAC key used to sign and verify tokens.
    pub secret: Vec<u8>,
    /// Lifetime of every issued token.
    pub token_ttl: Duration,
    /// Lifetime of a transaction record after creation.
    pub transaction_ttl: Duration,
    /// Rate applied by the default fixed rate source.
    pub sojor_percent: Percent,
    /// When set, `clear` requires a POS role token.
    pub clear_requires_auth: bool,
    /// When set, a role guessed from the subject id never passes a role guard.
    pub strict_roles: bool,
    pub preview_base: String,
}

impl EngineConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            token_ttl: DEFAULT_TOKEN_TTL,
            transaction_ttl: DEFAULT_TOKEN_TTL,
            sojor_percent: Percent::new(dec!(1.5)).unwrap_or(Percent::ZERO),
            clear_requires_auth: false,
            strict_roles: false,
            preview_base: DEFAULT_PREVIEW_BASE.to_string(),
        }
    }

    /// Sets the token TTL; the transaction TTL follows it.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self.transaction_ttl = ttl;
        self
    }

    pub fn with_transaction_ttl(mut self, ttl: Duration) -> Self {
        self.transaction_ttl = ttl;
        self
    }

    pub fn with_sojor_percent(mut self, percent: Percent) -> Self {
        self.sojor_percent = percent;
        self
    }

    pub fn with_clear_requires_auth(mut self, required: bool) -> Self {
        self.clear_requires_auth = required;
        self
    }

    pub fn with_strict_roles(mut self, strict: bool) -> Self {
        self.strict_roles = strict;
        self
    }

    pub fn with_preview_base(mut self, base: impl Into<String>) -> Self {
        self.preview_base = base.into();
        self
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret == DEV_SECRET.as_bytes()
    }

    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(PaymentError::ValidationError(
                "token secret must not be empty".to_string(),
            ));
        }
        if self.token_ttl.as_secs() == 0 {
            return Err(PaymentError::ValidationError(
                "token TTL must be at least one second".to_string(),
            ));
        }
        if self.transaction_ttl.as_secs() == 0 {
            return Err(PaymentError::ValidationError(
                "transaction TTL must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEV_SECRET)
    }
}

use crate::config::EngineConfig;
use crate::domain::clock::ClockHandle;
use crate::domain::token::{Capability, Role, RoleSource, TokenClaims};
use crate::domain::transaction::TransactionId;
use crate::error::{PaymentError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// A freshly minted token and how long it stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedToken {
    pub token: String,
    pub ttl_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role_source: Option<RoleSource>,
}

/// Mints and verifies short-lived capability tokens.
///
/// Tokens are `base64url(claims).base64url(hmac_sha256(claims))`. Nothing is
/// persisted and nothing can be revoked before expiry.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Vec<u8>,
    ttl_seconds: u64,
    clock: ClockHandle,
}

impl TokenIssuer {
    pub fn new(config: &EngineConfig, clock: ClockHandle) -> Self {
        Self {
            secret: config.secret.clone(),
            ttl_seconds: config.token_ttl.as_secs(),
            clock,
        }
    }

    /// Issues a role-scoped token.
    ///
    /// `role` must be `"client"` or `"pos"`. When it is omitted or blank the role is
    /// inferred from the subject id and the token is marked as
    /// [`RoleSource::Inferred`].
    pub fn issue(&self, subject: &str, role: Option<&str>) -> Result<IssuedToken> {
        let subject = subject.trim();
        if subject.is_empty() {
            return Err(PaymentError::ValidationError(
                "subjectId required".to_string(),
            ));
        }

        // A blank role counts as no role.
        let (role, source) = match role.map(str::trim).filter(|role| !role.is_empty()) {
            Some(role) => (role.parse::<Role>()?, RoleSource::Explicit),
            None => {
                let inferred = Role::infer_from_subject(subject);
                tracing::warn!(
                    subject,
                    role = %inferred,
                    "token requested without a role; inferred from subject id"
                );
                (inferred, RoleSource::Inferred)
            }
        };

        let (iat, exp) = self.window();
        let token = self.sign(&TokenClaims::Role {
            sub: subject.to_string(),
            role,
            src: source,
            iat,
            exp,
        })?;

        Ok(IssuedToken {
            token,
            ttl_seconds: self.ttl_seconds,
            role: Some(role),
            role_source: Some(source),
        })
    }

    /// Issues a token that only allows polling the given transaction.
    pub fn issue_for_transaction(&self, id: TransactionId) -> Result<IssuedToken> {
        let (iat, exp) = self.window();
        let token = self.sign(&TokenClaims::Tx { tx: id, iat, exp })?;
        Ok(IssuedToken {
            token,
            ttl_seconds: self.ttl_seconds,
            role: None,
            role_source: None,
        })
    }

    /// Checks signature and expiry and returns the raw claims.
    pub fn decode(&self, token: &str) -> Result<TokenClaims> {
        let token = token.trim();
        let token = token.strip_prefix("Bearer ").unwrap_or(token);
        let (payload, signature) = token
            .split_once('.')
            .ok_or_else(|| PaymentError::TokenInvalid("malformed token".to_string()))?;

        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| PaymentError::TokenInvalid("malformed signature".to_string()))?;
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| PaymentError::TokenInvalid("signature mismatch".to_string()))?;

        let body = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| PaymentError::TokenInvalid("malformed payload".to_string()))?;
        let claims: TokenClaims = serde_json::from_slice(&body)
            .map_err(|e| PaymentError::TokenInvalid(format!("malformed claims: {e}")))?;

        if claims.is_expired_at(self.clock.now().timestamp()) {
            return Err(PaymentError::TokenExpired);
        }
        Ok(claims)
    }

    /// Verifies a token and returns what it allows.
    pub fn verify(&self, token: &str) -> Result<Capability> {
        self.decode(token).map(TokenClaims::into_capability)
    }

    fn window(&self) -> (i64, i64) {
        let iat = self.clock.now().timestamp();
        (iat, iat.saturating_add_unsigned(self.ttl_seconds))
    }

    fn sign(&self, claims: &TokenClaims) -> Result<String> {
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
        let mut mac = self.mac()?;
        mac.update(payload.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    fn mac(&self) -> Result<HmacSha256> {
        HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| PaymentError::internal("invalid HMAC key"))
    }
}

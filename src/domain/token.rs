use crate::domain::transaction::TransactionId;
use crate::error::PaymentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The two parties of a point-of-sale payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Initiates transactions.
    Client,
    /// Confirms and authorizes them.
    Pos,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Pos => "pos",
        }
    }

    /// Legacy fallback used when a token request carries no role: subjects whose
    /// id mentions "pos" (any case) are treated as POS terminals.
    ///
    /// This is a naming convention, not an authentication mechanism.
    pub fn infer_from_subject(subject: &str) -> Self {
        if subject.to_ascii_lowercase().contains("pos") {
            Role::Pos
        } else {
            Role::Client
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Role::Client),
            "pos" => Ok(Role::Pos),
            other => Err(PaymentError::InvalidRole(other.to_string())),
        }
    }
}

/// How the role inside a token was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleSource {
    /// The caller asked for the role explicitly.
    #[default]
    Explicit,
    /// The role was guessed from the subject id.
    Inferred,
}

/// The signed body of a capability token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TokenClaims {
    /// Role-scoped token issued to a client or a POS terminal.
    Role {
        sub: String,
        role: Role,
        #[serde(default)]
        src: RoleSource,
        iat: i64,
        exp: i64,
    },
    /// Transaction-scoped token that only allows polling one transaction.
    Tx { tx: TransactionId, iat: i64, exp: i64 },
}

impl TokenClaims {
    pub fn expires_at(&self) -> i64 {
        match self {
            TokenClaims::Role { exp, .. } | TokenClaims::Tx { exp, .. } => *exp,
        }
    }

    /// A token is usable strictly before its `exp` second.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at()
    }

    pub fn into_capability(self) -> Capability {
        match self {
            TokenClaims::Role { sub, role, src, .. } => Capability::Role {
                subject: sub,
                role,
                source: src,
            },
            TokenClaims::Tx { tx, .. } => Capability::Transaction(tx),
        }
    }
}

/// What a verified token lets its holder do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    Role {
        subject: String,
        role: Role,
        source: RoleSource,
    },
    Transaction(TransactionId),
}

impl Capability {
    /// True when the capability may read the given transaction.
    pub fn can_read(&self, id: &TransactionId) -> bool {
        match self {
            Capability::Role { .. } => true,
            Capability::Transaction(tx) => tx == id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("client".parse::<Role>().unwrap(), Role::Client);
        assert_eq!("pos".parse::<Role>().unwrap(), Role::Pos);
        assert!(matches!(
            "POS".parse::<Role>(),
            Err(PaymentError::InvalidRole(_))
        ));
        assert!(matches!(
            "admin".parse::<Role>(),
            Err(PaymentError::InvalidRole(_))
        ));
    }

    #[test]
    fn test_role_inference() {
        assert_eq!(Role::infer_from_subject("POS-Terminal-7"), Role::Pos);
        assert_eq!(Role::infer_from_subject("store_pos"), Role::Pos);
        assert_eq!(Role::infer_from_subject("alice"), Role::Client);
    }

    #[test]
    fn test_expiry_boundary() {
        let claims = TokenClaims::Role {
            sub: "alice".to_string(),
            role: Role::Client,
            src: RoleSource::Explicit,
            iat: 100,
            exp: 400,
        };
        assert!(!claims.is_expired_at(399));
        assert!(claims.is_expired_at(400));
    }

    #[test]
    fn test_claims_wire_shape() {
        let id = TransactionId::new();
        let claims = TokenClaims::Tx {
            tx: id,
            iat: 1,
            exp: 2,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["kind"], "tx");
        assert_eq!(json["tx"], id.to_string());
    }

    #[test]
    fn test_transaction_capability_is_scoped() {
        let id = TransactionId::new();
        let cap = Capability::Transaction(id);
        assert!(cap.can_read(&id));
        assert!(!cap.can_read(&TransactionId::new()));
    }
}

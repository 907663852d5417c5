/// JWT Claims structure
///
/// Represents the payload of a signed token: who it is for, what kind of
/// token it is, and the standard JWT claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

/// Which half of a token pair a token is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// The caller-visible content of a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPayload {
    pub subject: Uuid,
    pub email: String,
    pub kind: TokenKind,
}

impl TokenPayload {
    pub fn new(subject: Uuid, email: impl Into<String>, kind: TokenKind) -> Self {
        Self {
            subject,
            email: email.into(),
            kind,
        }
    }
}

/// JWT Claims as serialized into the token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (account ID as UUID string)
    pub sub: String,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub iss: String,
    /// Unique token id, keeps two tokens minted in the same second apart
    pub jti: String,
}

impl Claims {
    /// Create new claims for a payload
    ///
    /// # Arguments
    /// * `payload` - Subject, email and token kind
    /// * `expiry_seconds` - Token expiration in seconds from now
    /// * `issuer` - Issuer identifier
    pub fn new(payload: &TokenPayload, expiry_seconds: i64, issuer: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: payload.subject.to_string(),
            email: payload.email.clone(),
            kind: payload.kind,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// Extract account ID from claims
    ///
    /// # Errors
    /// Returns an invalid-token error if the subject is not a UUID
    pub fn account_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::invalid_token())
    }

    /// Check if token has expired. A token is valid strictly before `exp`.
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp <= now
    }

    pub fn into_payload(self) -> Result<TokenPayload, AppError> {
        Ok(TokenPayload {
            subject: self.account_id()?,
            email: self.email,
            kind: self.kind,
        })
    }
}

/// JWT Token Signing and Verification
///
/// HS256 tokens over `Claims`. Every verification failure (malformed,
/// bad signature, wrong issuer, expired, unparseable subject) collapses
/// into the same invalid-token error.

use chrono::Duration;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenPayload};
use crate::error::AppError;

/// Signs and verifies the tokens handed to clients
pub trait TokenCodec: Send + Sync {
    fn sign(&self, payload: &TokenPayload, ttl: Duration) -> Result<String, AppError>;
    fn verify(&self, token: &str) -> Result<TokenPayload, AppError>;
}

/// HMAC-SHA256 JWT codec keyed by a server-held secret
pub struct JwtCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
}

impl JwtCodec {
    pub fn new(secret: &str, issuer: impl Into<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
        }
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;
        validation
    }
}

impl TokenCodec for JwtCodec {
    fn sign(&self, payload: &TokenPayload, ttl: Duration) -> Result<String, AppError> {
        let claims = Claims::new(payload, ttl.num_seconds(), self.issuer.clone());

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    fn verify(&self, token: &str) -> Result<TokenPayload, AppError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation())
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "JWT validation error");
                AppError::invalid_token()
            })?;

        // jsonwebtoken accepts exp == now; a token is only valid strictly before exp
        if claims.is_expired() {
            tracing::debug!("JWT expired at boundary");
            return Err(AppError::invalid_token());
        }

        claims.into_payload()
    }
}

/// Refresh Token Fingerprinting
///
/// Refresh tokens are never stored in plaintext. The stored session keeps a
/// bcrypt hash of the token's SHA-256 digest:
/// - the digest is a fixed 64 hex chars, inside bcrypt's 72-byte input limit
///   (raw JWTs share a long common prefix and would collide after truncation)
/// - bcrypt adds the salt and work factor used for passwords

use sha2::{Digest, Sha256};

use crate::auth::password::PasswordHasher;
use crate::error::AppError;

/// SHA-256 hex digest of a raw refresh token
pub fn digest_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hash a raw refresh token for storage
pub fn hash_refresh_token(hasher: &dyn PasswordHasher, token: &str) -> Result<String, AppError> {
    hasher.hash(&digest_token(token))
}

/// Check a presented refresh token against the stored hash
pub fn verify_refresh_token(
    hasher: &dyn PasswordHasher,
    token: &str,
    stored_hash: &str,
) -> Result<bool, AppError> {
    hasher.verify(&digest_token(token), stored_hash)
}

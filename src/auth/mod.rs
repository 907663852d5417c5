/// Authentication module
///
/// Token signing/verification, password hashing and refresh token
/// fingerprinting.

mod claims;
mod jwt;
mod password;
mod refresh_token;

pub use claims::{Claims, TokenKind, TokenPayload};
pub use jwt::{JwtCodec, TokenCodec};
pub use password::{BcryptHasher, PasswordHasher};
pub use refresh_token::{digest_token, hash_refresh_token, verify_refresh_token};

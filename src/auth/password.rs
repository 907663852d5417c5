/// Password Hashing and Verification
///
/// Salted bcrypt hashing with a tunable work factor. Verification is
/// delegated to bcrypt, which compares digests in constant time.

use crate::error::AppError;

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, AppError>;
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, AppError>;
}

#[derive(Debug, Clone)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    /// Hash a secret using bcrypt
    ///
    /// # Errors
    /// Returns error if bcrypt hashing fails (e.g. invalid cost)
    fn hash(&self, plaintext: &str) -> Result<String, AppError> {
        bcrypt::hash(plaintext, self.cost)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a secret against its hash
    ///
    /// # Errors
    /// Returns error if the stored hash is not a valid bcrypt hash
    fn verify(&self, plaintext: &str, hash: &str) -> Result<bool, AppError> {
        bcrypt::verify(plaintext, hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> BcryptHasher {
        BcryptHasher::new(4)
    }

    #[test]
    fn test_hash_password() {
        let password = "secret1";
        let hash = hasher().hash(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        assert!(hash.starts_with("$2"));
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = hasher();
        let a = hasher.hash("secret1").unwrap();
        let b = hasher.hash("secret1").unwrap();

        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").expect("Failed to hash password");

        assert!(hasher.verify("secret1", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hasher = hasher();
        let hash = hasher.hash("secret1").expect("Failed to hash password");

        assert!(!hasher.verify("secret2", &hash).expect("Failed to verify password"));
    }

    #[test]
    fn test_verify_against_garbage_hash_errors() {
        assert!(hasher().verify("secret1", "not-a-bcrypt-hash").is_err());
    }

    #[test]
    fn test_cost_is_encoded_in_hash() {
        let hash = BcryptHasher::new(5).hash("secret1").unwrap();
        assert!(hash.contains("$05$"));
    }
}

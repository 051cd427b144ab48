// Password hashing utilities
// Uses bcrypt for secure password hashing

use bcrypt::{hash, verify, DEFAULT_COST};
use thiserror::Error;

/// Errors from hashing or verifying a password
#[derive(Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct PasswordError(String);

impl From<bcrypt::BcryptError> for PasswordError {
    fn from(err: bcrypt::BcryptError) -> Self {
        PasswordError(err.to_string())
    }
}

/// One-way credential hashing with a per-call salt
///
/// Both calls are CPU-bound; async callers should run them on the blocking
/// pool.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password
    fn hash(&self, password: &str) -> Result<String, PasswordError>;

    /// Verifies a plaintext password against a digest
    fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordError>;
}

/// bcrypt-backed hasher with a single configured cost
///
/// # Example
/// ```
/// use accounts_api::auth::password::{BcryptHasher, PasswordHasher};
///
/// let hasher = BcryptHasher::new(4);
/// let digest = hasher.hash("my_password").expect("valid hash");
/// assert!(hasher.verify("my_password", &digest).unwrap());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    /// Creates a hasher with the given bcrypt cost (4..=31)
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, PasswordError> {
        Ok(hash(password, self.cost)?)
    }

    fn verify(&self, password: &str, digest: &str) -> Result<bool, PasswordError> {
        Ok(verify(password, digest)?)
    }
}

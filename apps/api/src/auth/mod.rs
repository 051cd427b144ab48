// Credential handling
// Only hashing lives here; token issuance is left to the caller.

pub mod password;

pub use password::{BcryptHasher, PasswordError, PasswordHasher};

//! Salted password hashing.
//!
//! Uses Argon2id with the default parameters of the `argon2` crate.
//! Hashes are PHC strings that carry their own salt and parameters.

use crate::{Error, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand_core::OsRng;

/// Hash `password` with a freshly generated salt.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|error| Error::PasswordHash(error.to_string()))
}

/// Returns true if `password` matches `hashed_password`.
/// A malformed hash never matches.
pub fn is_valid(hashed_password: &str, password: &str) -> bool {
    match PasswordHash::new(hashed_password) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(error) => {
            log::warn!("Refusing to verify against a malformed password hash: {error}");
            false
        }
    }
}

//! Argon2id credential hashing.

use anyhow::anyhow;
use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _,
};
use rand::rngs::OsRng;

use super::error::AuthError;

/// One-way hashing and verification of user secrets.
///
/// Hashes are PHC strings, so parameters and salt travel with the hash.
#[derive(Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use explicit Argon2 parameters (tests use cheaper ones).
    #[must_use]
    pub fn with_params(params: argon2::Params) -> Self {
        Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
        }
    }

    /// Hash `secret` with a fresh random salt.
    ///
    /// # Errors
    /// Only fails if Argon2 rejects its own parameters.
    pub fn hash(&self, secret: &str) -> Result<String, AuthError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(secret.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| AuthError::Internal(anyhow!("failed to hash password: {err}")))
    }

    /// Verify `candidate` against a stored hash. Malformed hashes verify as `false`.
    #[must_use]
    pub fn verify(&self, hashed: &str, candidate: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hashed) else {
            return false;
        };
        self.argon2
            .verify_password(candidate.as_bytes(), &parsed)
            .is_ok()
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher").finish_non_exhaustive()
    }
}

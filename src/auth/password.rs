use std::sync::Arc;

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use thiserror::Error;
use tracing::error;

use crate::config::HashConfig;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("invalid argon2 parameters: {0}")]
    Params(String),
    #[error("argon2 hash error: {0}")]
    Hash(String),
    #[error("malformed password hash: {0}")]
    Malformed(String),
}

/// Argon2id password hasher with a fixed work factor.
#[derive(Clone)]
pub struct Hasher {
    params: Params,
    // hash of a random secret nobody knows, verified against on lookup misses
    decoy: Arc<str>,
}

impl Hasher {
    pub fn new(cfg: HashConfig) -> Result<Self, HashError> {
        let params = Params::new(cfg.memory_kib, cfg.iterations, Params::DEFAULT_P_COST, None)
            .map_err(|e| HashError::Params(e.to_string()))?;
        let mut hasher = Self {
            params,
            decoy: Arc::from(""),
        };
        let secret = SaltString::generate(&mut OsRng);
        hasher.decoy = Arc::from(hasher.hash(secret.as_str())?);
        Ok(hasher)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hashes with a fresh random salt, so equal inputs give different outputs.
    pub fn hash(&self, plain: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| {
                error!(error = %e, "argon2 hash_password error");
                HashError::Hash(e.to_string())
            })?
            .to_string();
        Ok(hash)
    }

    /// `Ok(false)` on mismatch; errors only when `hash` is not a PHC string.
    /// Parameters embedded in the stored hash take precedence over ours.
    pub fn verify(&self, plain: &str, hash: &str) -> Result<bool, HashError> {
        let parsed = PasswordHash::new(hash).map_err(|e| HashError::Malformed(e.to_string()))?;
        Ok(self
            .argon2()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok())
    }

    /// Spends the same Argon2 work as `verify` for a user that does not
    /// exist. Always `false`.
    pub fn verify_decoy(&self, plain: &str) -> bool {
        self.verify(plain, &self.decoy).unwrap_or(false)
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> Hasher {
    // minimum cost keeps the suite fast
    Hasher::new(HashConfig {
        memory_kib: Params::MIN_M_COST,
        iterations: 1,
    })
    .expect("valid test params")
}

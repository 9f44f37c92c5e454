//! Credential hashing for steward.
//!
//! Uses Argon2id. The work factor comes from `[security]` in the config; the
//! salt and parameters are embedded in the PHC output, so verification never
//! needs the current settings.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::OsRng;
use thiserror::Error;

use crate::config::SecurityConfig;

/// Password hashing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    /// Cost parameters rejected by Argon2.
    #[error("invalid hashing parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),
}

/// One-way salted credential hashing.
///
/// Implementations are CPU-bound and synchronous; callers run them on the
/// blocking pool.
pub trait CredentialHasher: Send + Sync + std::fmt::Debug {
    /// Hash a plaintext credential into an opaque, self-describing string.
    fn hash(&self, plain: &str) -> Result<String, PasswordError>;

    /// Check a plaintext credential against a stored hash.
    ///
    /// A malformed stored hash never matches.
    fn verify(&self, plain: &str, stored: &str) -> bool;
}

/// Argon2id hasher with a configurable work factor.
#[derive(Debug, Clone)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    /// Create a hasher with explicit cost parameters.
    ///
    /// - `memory_kib`: memory cost in KiB
    /// - `iterations`: time cost
    /// - `parallelism`: lanes
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    /// Create a hasher from the security settings.
    pub fn from_config(config: &SecurityConfig) -> Result<Self, PasswordError> {
        Self::new(
            config.hash_memory_kib,
            config.hash_iterations,
            config.hash_parallelism,
        )
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2()
            .hash_password(plain.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify(&self, plain: &str, stored: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(stored) else {
            return false;
        };
        // Parameters are read from the parsed hash.
        Argon2::default()
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}

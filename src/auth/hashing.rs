//! Bounded worker pool for credential hashing.
//!
//! Argon2 is CPU-bound, so every hash and verify runs on tokio's blocking
//! pool. A semaphore caps how many run at once, keeping a burst of logins
//! from exhausting the blocking threads.

use std::sync::Arc;

use rand::Rng;
use tokio::sync::Semaphore;
use tracing::error;

use super::password::{CredentialHasher, PasswordError};

/// Alphabet for generated passwords, without look-alike characters.
const PASSWORD_CHARS: &[u8] = b"abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Length of generated temporary passwords.
pub const TEMPORARY_PASSWORD_LENGTH: usize = 12;

/// Generate a random password of the given length.
pub fn generate_password(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| {
            let idx = rng.random_range(0..PASSWORD_CHARS.len());
            PASSWORD_CHARS[idx] as char
        })
        .collect()
}

/// Runs a [`CredentialHasher`] on at most `workers` blocking threads.
#[derive(Debug, Clone)]
pub struct HashingPool {
    hasher: Arc<dyn CredentialHasher>,
    permits: Arc<Semaphore>,
}

impl HashingPool {
    /// Create a pool with `workers` concurrent jobs (at least one).
    pub fn new(hasher: Arc<dyn CredentialHasher>, workers: usize) -> Self {
        Self {
            hasher,
            permits: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Hash a plaintext credential.
    pub async fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| PasswordError::HashError(e.to_string()))?;

        let hasher = Arc::clone(&self.hasher);
        let plain = plain.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&plain))
            .await
            .map_err(|e| PasswordError::HashError(e.to_string()))?
    }

    /// Verify a plaintext credential. Fails closed.
    pub async fn verify(&self, plain: &str, stored: &str) -> bool {
        let Ok(_permit) = self.permits.acquire().await else {
            return false;
        };

        let hasher = Arc::clone(&self.hasher);
        let plain = plain.to_owned();
        let stored = stored.to_owned();
        match tokio::task::spawn_blocking(move || hasher.verify(&plain, &stored)).await {
            Ok(matched) => matched,
            Err(e) => {
                error!(error = %e, "Password verification task failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Argon2Hasher;

    fn pool(workers: usize) -> HashingPool {
        HashingPool::new(Arc::new(Argon2Hasher::new(8, 1, 1).unwrap()), workers)
    }

    #[test]
    fn test_generate_password_length_and_alphabet() {
        let password = generate_password(TEMPORARY_PASSWORD_LENGTH);
        assert_eq!(password.len(), 12);
        assert!(password.bytes().all(|b| PASSWORD_CHARS.contains(&b)));
    }

    #[test]
    fn test_generate_password_excludes_ambiguous() {
        for _ in 0..20 {
            let password = generate_password(64);
            assert!(!password.contains(['0', 'O', '1', 'l', 'I']));
        }
    }

    #[tokio::test]
    async fn test_hash_and_verify() {
        let pool = pool(2);
        let hash = pool.hash("password123").await.unwrap();
        assert!(pool.verify("password123", &hash).await);
        assert!(!pool.verify("password124", &hash).await);
        assert!(!pool.verify("password123", "garbage").await);
    }

    #[tokio::test]
    async fn test_concurrent_jobs_with_single_worker() {
        let pool = pool(1);
        let mut handles = Vec::new();
        for i in 0..4 {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let plain = format!("password{i}");
                let hash = pool.hash(&plain).await.unwrap();
                pool.verify(&plain, &hash).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
    }
}

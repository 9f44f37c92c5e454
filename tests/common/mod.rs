//! Test helpers for integration tests.
//!
//! Builds a bootstrapped `IdentityService` with a cheap Argon2 cost, a
//! manual clock and a hasher that counts its invocations.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use steward::auth::PasswordError;
use steward::bootstrap::{self, BootstrapReport};
use steward::{
    Argon2Hasher, Caller, Config, CredentialHasher, Database, IdentityService, ManualClock,
    NewUserRequest, Role, Session,
};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin123";

/// Hasher wrapper recording how often it is called.
#[derive(Debug)]
pub struct CountingHasher {
    inner: Argon2Hasher,
    hashes: AtomicUsize,
    verifies: AtomicUsize,
}

impl CountingHasher {
    pub fn new(inner: Argon2Hasher) -> Self {
        Self {
            inner,
            hashes: AtomicUsize::new(0),
            verifies: AtomicUsize::new(0),
        }
    }

    pub fn hash_calls(&self) -> usize {
        self.hashes.load(Ordering::SeqCst)
    }

    pub fn verify_calls(&self) -> usize {
        self.verifies.load(Ordering::SeqCst)
    }
}

impl CredentialHasher for CountingHasher {
    fn hash(&self, plain: &str) -> Result<String, PasswordError> {
        self.hashes.fetch_add(1, Ordering::SeqCst);
        self.inner.hash(plain)
    }

    fn verify(&self, plain: &str, stored: &str) -> bool {
        self.verifies.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(plain, stored)
    }
}

/// A service under test plus the handles tests poke at.
pub struct TestEnv {
    pub service: Arc<IdentityService>,
    pub clock: ManualClock,
    pub hasher: Arc<CountingHasher>,
    pub config: Config,
    pub report: BootstrapReport,
}

/// Configuration with the cheapest Argon2 cost.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.security.hash_memory_kib = 8;
    config.security.hash_iterations = 1;
    config.security.hash_parallelism = 1;
    config
}

async fn build(db: Database, config: Config) -> TestEnv {
    let clock = ManualClock::default();
    let hasher = Arc::new(CountingHasher::new(
        Argon2Hasher::from_config(&config.security).unwrap(),
    ));
    let service = Arc::new(IdentityService::with_parts(
        Arc::new(db),
        &config.security,
        Arc::new(clock.clone()),
        hasher.clone(),
    ));
    let report = bootstrap::run(&service, &config.bootstrap).await.unwrap();
    TestEnv {
        service,
        clock,
        hasher,
        config,
        report,
    }
}

/// Bootstrapped service on an in-memory database.
pub async fn setup() -> TestEnv {
    setup_with(test_config()).await
}

/// Bootstrapped in-memory service with a custom configuration.
pub async fn setup_with(config: Config) -> TestEnv {
    build(Database::open_in_memory().await.unwrap(), config).await
}

/// Bootstrapped service on a database file under `dir`.
pub async fn setup_on_disk(dir: &Path) -> TestEnv {
    let db = Database::open(dir.join("steward.db")).await.unwrap();
    build(db, test_config()).await
}

impl TestEnv {
    pub async fn role(&self, name: &str) -> Role {
        self.service
            .roles()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.name == name)
            .unwrap()
    }

    pub async fn admin_session(&self) -> Session {
        self.service
            .authenticate(ADMIN_USERNAME, ADMIN_PASSWORD, &Caller::anonymous())
            .await
            .unwrap()
    }

    /// Create an account with the named role, acting as the administrator.
    pub async fn create_user(&self, username: &str, password: &str, role: &str) -> i64 {
        let admin = self.admin_session().await;
        let role_id = self.role(role).await.id;
        self.service
            .create_user(
                &Caller::from_session(&admin),
                NewUserRequest::new(
                    username,
                    format!("{username}@x.com"),
                    username,
                    password,
                    role_id,
                ),
            )
            .await
            .unwrap()
            .id
    }
}

//! Session management for steward.
//!
//! Sessions are issued on successful authentication and looked up by an
//! opaque bearer token. Only the token's SHA-256 digest is stored. Idle
//! expiry is lazy: `current_session` destroys a session found idle past the
//! timeout, otherwise refreshes its `last_activity`.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use uuid::Uuid;

use crate::clock::{self, Clock};
use crate::config::SecurityConfig;
use crate::db::{Account, Database, Permission, SessionRecord, SessionRepository};
use crate::Result;

use super::permission;

/// Default idle timeout in seconds (8 hours).
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 8 * 60 * 60;

/// An authenticated session.
///
/// The permission set is a snapshot taken at login; role changes apply to
/// sessions created afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Bearer token presented by the caller.
    pub token: String,
    pub account_id: i64,
    pub username: String,
    pub role_id: i64,
    pub permissions: Vec<Permission>,
    /// The account must change its password before doing anything else.
    pub must_change_password: bool,
    pub login_time: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    fn from_record(token: String, record: SessionRecord) -> Self {
        Self {
            token,
            account_id: record.account_id,
            username: record.username,
            role_id: record.role_id,
            permissions: record.permissions,
            must_change_password: record.must_change_password,
            login_time: record.login_time,
            last_activity: record.last_activity,
        }
    }

    /// Check the snapshot for `(module, action, resource?)`.
    pub fn has_permission(&self, module: &str, action: &str, resource: Option<&str>) -> bool {
        permission::has_permission(&self.permissions, module, action, resource)
    }

    /// Time since the last activity.
    pub fn idle_time(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_activity
    }
}

/// Digest under which a token is stored.
pub fn hash_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// Generate an unguessable bearer token.
fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Issues, validates and expires sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    idle_timeout: Duration,
    exclusive: bool,
}

impl SessionManager {
    /// Create a session manager with the default idle timeout.
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            idle_timeout: clock::secs(DEFAULT_IDLE_TIMEOUT_SECS),
            exclusive: false,
        }
    }

    /// Create a session manager from the security settings.
    pub fn from_config(db: Arc<Database>, clock: Arc<dyn Clock>, config: &SecurityConfig) -> Self {
        Self::new(db, clock)
            .with_idle_timeout(clock::secs(config.idle_timeout_secs))
            .with_exclusive(config.exclusive_sessions)
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Revoke an account's other sessions whenever it logs in.
    pub fn with_exclusive(mut self, exclusive: bool) -> Self {
        self.exclusive = exclusive;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn repo(&self) -> SessionRepository<'_> {
        SessionRepository::new(self.db.pool())
    }

    /// Create a session for an authenticated account.
    pub async fn create_session(
        &self,
        account: &Account,
        permissions: Vec<Permission>,
    ) -> Result<Session> {
        let now = self.clock.now();
        let token = generate_token();
        let record = SessionRecord {
            token_hash: hash_token(&token),
            account_id: account.id,
            username: account.username.clone(),
            role_id: account.role_id,
            permissions,
            must_change_password: account.must_change_password,
            login_time: now,
            last_activity: now,
        };

        let repo = self.repo();
        repo.create(&record).await?;

        if self.exclusive {
            let revoked = repo
                .delete_for_account(account.id, Some(&record.token_hash))
                .await?;
            if revoked > 0 {
                info!(
                    account_id = account.id,
                    revoked, "Revoked previous sessions on new login"
                );
            }
        }

        debug!(account_id = account.id, username = %account.username, "Session created");
        Ok(Session::from_record(token, record))
    }

    /// Resolve a token to its live session.
    ///
    /// Returns None for unknown tokens and for sessions idle past the
    /// timeout (which are destroyed). A live session's `last_activity` is
    /// refreshed.
    pub async fn current_session(&self, token: &str) -> Result<Option<Session>> {
        let token_hash = hash_token(token);
        let repo = self.repo();

        let Some(mut record) = repo.get(&token_hash).await? else {
            return Ok(None);
        };

        let now = self.clock.now();
        if now - record.last_activity > self.idle_timeout {
            repo.delete(&token_hash).await?;
            info!(
                account_id = record.account_id,
                username = %record.username,
                "Session expired (idle timeout)"
            );
            return Ok(None);
        }

        if !repo.touch(&token_hash, now).await? {
            // Logged out concurrently.
            return Ok(None);
        }
        record.last_activity = now;

        Ok(Some(Session::from_record(token.to_string(), record)))
    }

    /// Destroy a session. Returns true if it existed.
    pub async fn logout(&self, token: &str) -> Result<bool> {
        let removed = self.repo().delete(&hash_token(token)).await?;
        if removed {
            info!("Session ended by logout");
        } else {
            debug!("Logout: session not found");
        }
        Ok(removed)
    }

    /// Destroy every session of an account, optionally keeping one token.
    pub async fn revoke_account(&self, account_id: i64, keep: Option<&str>) -> Result<u64> {
        let keep_hash = keep.map(hash_token);
        let removed = self
            .repo()
            .delete_for_account(account_id, keep_hash.as_deref())
            .await?;
        if removed > 0 {
            info!(account_id, removed, "Revoked account sessions");
        }
        Ok(removed)
    }

    /// Mark the account's sessions as no longer requiring a password change.
    pub async fn clear_must_change(&self, account_id: i64) -> Result<()> {
        self.repo().clear_must_change(account_id).await
    }

    /// Remove all sessions idle past the timeout.
    pub async fn cleanup(&self) -> Result<u64> {
        let cutoff = self.clock.now() - self.idle_timeout;
        let removed = self.repo().delete_idle_before(cutoff).await?;
        if removed > 0 {
            debug!(removed, "Cleaned up idle sessions");
        }
        Ok(removed)
    }

    /// Number of stored sessions.
    pub async fn session_count(&self) -> Result<i64> {
        self.repo().count().await
    }

    /// Number of stored sessions of an account.
    pub async fn account_session_count(&self, account_id: i64) -> Result<i64> {
        self.repo().count_for_account(account_id).await
    }
}

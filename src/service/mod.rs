//! The identity service: the single entry point external collaborators call.
//!
//! `IdentityService` owns the database, clock, hashing pool, session manager
//! and audit logger, and serializes each store's read-modify-write sequences
//! behind a per-store mutex.

mod accounts;
mod authenticate;
mod roles;

pub use accounts::{NewUserRequest, UserUpdate};

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audit::{AuditEvent, AuditFilter, AuditLogEntry, AuditLogger, Caller};
use crate::auth::{
    Argon2Hasher, CredentialHasher, HashingPool, LockoutPolicy, Session, SessionManager,
};
use crate::clock::{Clock, SystemClock};
use crate::config::SecurityConfig;
use crate::db::Database;
use crate::{Result, StewardError};

/// Identity and access-control core.
#[derive(Debug)]
pub struct IdentityService {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    hashing: HashingPool,
    sessions: SessionManager,
    audit: AuditLogger,
    lockout: LockoutPolicy,
    /// Serializes account read-modify-write (uniqueness, lockout counters).
    accounts_lock: Mutex<()>,
    /// Serializes role read-modify-write.
    roles_lock: Mutex<()>,
}

impl IdentityService {
    /// Create a service with the system clock and an Argon2 hasher built
    /// from `config`.
    pub fn new(db: Arc<Database>, config: &SecurityConfig) -> Result<Self> {
        let hasher = Argon2Hasher::from_config(config)
            .map_err(|e| StewardError::Config(e.to_string()))?;
        Ok(Self::with_parts(
            db,
            config,
            Arc::new(SystemClock),
            Arc::new(hasher),
        ))
    }

    /// Create a service from explicit parts.
    pub fn with_parts(
        db: Arc<Database>,
        config: &SecurityConfig,
        clock: Arc<dyn Clock>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        let sessions = SessionManager::from_config(Arc::clone(&db), Arc::clone(&clock), config);
        let audit = AuditLogger::new(Arc::clone(&db), Arc::clone(&clock))
            .with_retention(config.audit_retention);

        Self {
            hashing: HashingPool::new(hasher, config.hash_workers),
            lockout: LockoutPolicy::from_config(config),
            sessions,
            audit,
            db,
            clock,
            accounts_lock: Mutex::new(()),
            roles_lock: Mutex::new(()),
        }
    }

    /// The underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// The service clock.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The session manager.
    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// The audit logger.
    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    // --- sessions ---

    /// Resolve a bearer token to its live session, refreshing its activity.
    ///
    /// Idle-expired sessions are destroyed and reported as `None`.
    pub async fn current_session(&self, token: &str) -> Result<Option<Session>> {
        self.sessions.current_session(token).await
    }

    /// Decide `(module, action, resource?)` for the session behind `token`.
    ///
    /// False when there is no live session. The token is resolved through
    /// [`current_session`](Self::current_session), so each check counts as
    /// activity and refreshes the session's `last_activity`.
    pub async fn has_permission(
        &self,
        token: &str,
        module: &str,
        action: &str,
        resource: Option<&str>,
    ) -> Result<bool> {
        let allowed = match self.current_session(token).await? {
            Some(session) => session.has_permission(module, action, resource),
            None => false,
        };
        debug!(module, action, resource, allowed, "Permission check");
        Ok(allowed)
    }

    /// End the session behind `token`. Returns false if there was none.
    pub async fn logout(&self, token: &str, caller: &Caller) -> Result<bool> {
        let Some(session) = self.sessions.current_session(token).await? else {
            return Ok(false);
        };
        let removed = self.sessions.logout(token).await?;
        if removed {
            info!(username = %session.username, "User logged out");
            self.audit
                .record(
                    &caller.as_account(session.account_id, &session.username),
                    AuditEvent::new("logout", "auth").resource(session.account_id),
                )
                .await;
        }
        Ok(removed)
    }

    /// Remove every idle-expired session.
    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        self.sessions.cleanup().await
    }

    /// Periodically purge idle-expired sessions on a background task.
    pub fn spawn_session_sweeper(self: &Arc<Self>, interval: StdDuration) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let interval = interval.max(StdDuration::from_millis(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match service.purge_expired_sessions().await {
                    Ok(removed) if removed > 0 => info!(removed, "Session sweep"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Session sweep failed"),
                }
            }
        })
    }

    // --- audit ---

    /// Record a caller-supplied event.
    pub async fn log_action(&self, caller: &Caller, event: AuditEvent) -> Result<i64> {
        self.audit.log(caller, event).await
    }

    /// Audit entries matching `filter`, newest first.
    pub async fn audit_logs(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>> {
        self.audit.query(filter).await
    }
}

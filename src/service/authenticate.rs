//! Authentication: lookup, lockout guard, credential check, session issue.

use serde_json::json;
use tracing::{info, warn};

use super::IdentityService;
use crate::audit::{AuditEvent, Caller};
use crate::auth::{AuthError, LockState, Session};
use crate::db::{Account, AccountRepository, RoleRepository};

impl IdentityService {
    /// Authenticate a username/password pair and open a session.
    ///
    /// The lockout policy is applied before the credential is hashed, so an
    /// attempt against a locked account never reaches the hasher. Unknown
    /// and deactivated usernames are rejected before hashing and audited
    /// exactly like wrong passwords.
    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
        caller: &Caller,
    ) -> Result<Session, AuthError> {
        let repo = AccountRepository::new(self.db.pool());

        let account = match repo.get_by_username(username).await? {
            Some(account) if account.is_active => account,
            found => {
                if found.is_some() {
                    warn!(username = %username, "Login rejected: account inactive");
                } else {
                    warn!(username = %username, "Login failed: account not found");
                }
                self.record_failed_login(caller, username).await;
                return Err(AuthError::AccountNotFound);
            }
        };

        if let LockState::Locked { until } =
            self.lockout
                .state(account.login_attempts, account.locked_until, self.clock.now())
        {
            warn!(username = %account.username, %until, "Login rejected: account locked");
            self.audit
                .record(
                    &caller.as_account(account.id, &account.username),
                    AuditEvent::new("login", "auth")
                        .resource(account.id)
                        .new_value(json!({ "reason": "account_locked", "locked_until": until }))
                        .warning(),
                )
                .await;
            return Err(AuthError::AccountLocked { until });
        }

        if !self.hashing.verify(password, &account.password_hash).await {
            self.register_failure(&account, caller).await?;
            return Err(AuthError::InvalidCredentials);
        }

        repo.record_login(account.id, self.clock.now()).await?;

        let permissions = RoleRepository::new(self.db.pool())
            .get_by_id(account.role_id)
            .await?
            .map(|role| role.permissions)
            .unwrap_or_default();

        let session = self.sessions.create_session(&account, permissions).await?;

        info!(
            account_id = account.id,
            username = %account.username,
            must_change_password = account.must_change_password,
            "Login successful"
        );
        self.audit
            .record(
                &caller.as_account(account.id, &account.username),
                AuditEvent::new("login", "auth").resource(account.id),
            )
            .await;

        Ok(session)
    }

    /// Audit entry shared by unknown or inactive usernames and wrong
    /// passwords.
    async fn record_failed_login(&self, caller: &Caller, username: &str) {
        self.audit
            .record(
                caller,
                AuditEvent::new("login", "auth")
                    .new_value(json!({ "username": username, "reason": "invalid_credentials" }))
                    .failure(),
            )
            .await;
    }

    /// Apply the failure transition under the accounts lock.
    ///
    /// The account is re-read inside the lock so concurrent failures neither
    /// undercount nor lock twice.
    async fn register_failure(&self, account: &Account, caller: &Caller) -> Result<(), AuthError> {
        let transition = {
            let _guard = self.accounts_lock.lock().await;
            let repo = AccountRepository::new(self.db.pool());
            let Some(current) = repo.get_by_id(account.id).await? else {
                return Ok(());
            };

            let now = self.clock.now();
            let state = self
                .lockout
                .state(current.login_attempts, current.locked_until, now);
            if let LockState::Locked { .. } = state {
                // Locked by a concurrent failure after our check.
                None
            } else {
                let transition = self.lockout.on_failure(state, now);
                repo.set_lock_state(account.id, transition.attempts, transition.locked_until)
                    .await?;
                Some(transition)
            }
        };

        warn!(
            username = %account.username,
            attempts = transition.map(|t| t.attempts),
            "Login failed: invalid password"
        );
        self.record_failed_login(caller, &account.username).await;

        if let Some(t) = transition.filter(|t| t.newly_locked) {
            warn!(
                username = %account.username,
                locked_until = ?t.locked_until,
                "Account locked after too many failed attempts"
            );
            self.audit
                .record(
                    &caller.as_account(account.id, &account.username),
                    AuditEvent::new("account_locked", "auth")
                        .resource(account.id)
                        .new_value(json!({
                            "login_attempts": t.attempts,
                            "locked_until": t.locked_until,
                        }))
                        .warning(),
                )
                .await;
        }

        Ok(())
    }
}

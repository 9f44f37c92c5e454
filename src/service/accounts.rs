//! Account management operations.

use serde_json::json;
use tracing::{info, warn};

use super::IdentityService;
use crate::audit::{snapshot, AuditEvent, Caller};
use crate::auth::validation::{
    validate_email, validate_full_name, validate_new_account, validate_password,
};
use crate::auth::{generate_password, AccountError, TEMPORARY_PASSWORD_LENGTH};
use crate::db::{Account, AccountRepository, AccountUpdate, NewAccount, RoleRepository};
use crate::StewardError;

/// Input for creating an account.
#[derive(Debug, Clone)]
pub struct NewUserRequest {
    pub username: String,
    pub email: String,
    pub full_name: String,
    /// Plaintext; hashed before anything is stored.
    pub password: String,
    pub role_id: i64,
    pub must_change_password: bool,
}

impl NewUserRequest {
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        password: impl Into<String>,
        role_id: i64,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            full_name: full_name.into(),
            password: password.into(),
            role_id,
            must_change_password: false,
        }
    }

    /// Force a password change at first login.
    pub fn with_must_change_password(mut self, must_change: bool) -> Self {
        self.must_change_password = must_change;
        self
    }
}

/// Editable account fields.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub role_id: Option<i64>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn role_id(mut self, role_id: i64) -> Self {
        self.role_id = Some(role_id);
        self
    }
}

/// Map a store-level uniqueness conflict to the account error.
fn account_error(e: StewardError) -> AccountError {
    match e {
        StewardError::Conflict(field) if field == "email" => AccountError::DuplicateEmail,
        StewardError::Conflict(_) => AccountError::DuplicateUsername,
        other => AccountError::Storage(other),
    }
}

impl IdentityService {
    fn accounts(&self) -> AccountRepository<'_> {
        AccountRepository::new(self.db.pool())
    }

    async fn ensure_role_exists(&self, role_id: i64) -> Result<(), AccountError> {
        match RoleRepository::new(self.db.pool()).get_by_id(role_id).await? {
            Some(_) => Ok(()),
            None => Err(AccountError::RoleNotFound),
        }
    }

    async fn existing_account(&self, id: i64) -> Result<Account, AccountError> {
        self.accounts()
            .get_by_id(id)
            .await?
            .ok_or(AccountError::NotFound)
    }

    /// Create an account.
    ///
    /// The uniqueness check and the insert run under the accounts lock, so
    /// concurrent requests for the same username or email yield exactly one
    /// account. A duplicate writes nothing and is not audited.
    pub async fn create_user(
        &self,
        caller: &Caller,
        request: NewUserRequest,
    ) -> Result<Account, AccountError> {
        validate_new_account(
            &request.username,
            &request.email,
            &request.full_name,
            &request.password,
        )?;
        self.ensure_role_exists(request.role_id).await?;

        let password_hash = self.hashing.hash(&request.password).await?;
        let draft = NewAccount::new(
            &request.username,
            &request.email,
            &request.full_name,
            request.role_id,
            password_hash,
        )
        .with_must_change_password(request.must_change_password)
        .with_created_by(caller.display_name());

        let account = {
            let _guard = self.accounts_lock.lock().await;
            let repo = self.accounts();
            if repo.username_exists(&draft.username).await? {
                return Err(AccountError::DuplicateUsername);
            }
            if repo.email_exists(&draft.email, None).await? {
                return Err(AccountError::DuplicateEmail);
            }
            repo.create(&draft, self.clock.now())
                .await
                .map_err(account_error)?
        };

        info!(
            account_id = account.id,
            username = %account.username,
            created_by = %account.created_by,
            "Account created"
        );
        self.audit
            .record(
                caller,
                AuditEvent::new("create_user", "security")
                    .resource(account.id)
                    .new_value(snapshot(&account)),
            )
            .await;

        Ok(account)
    }

    /// All accounts, including inactive ones, ordered by username.
    pub async fn users(&self) -> Result<Vec<Account>, AccountError> {
        Ok(self.accounts().list_all().await?)
    }

    /// Look up an account by ID.
    pub async fn user(&self, id: i64) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts().get_by_id(id).await?)
    }

    /// Look up an account by username (case-insensitive).
    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>, AccountError> {
        Ok(self.accounts().get_by_username(username).await?)
    }

    /// Change an account's profile fields or role.
    ///
    /// Existing sessions keep the permission snapshot taken at their login.
    pub async fn update_user(
        &self,
        caller: &Caller,
        id: i64,
        update: UserUpdate,
    ) -> Result<Account, AccountError> {
        if let Some(ref full_name) = update.full_name {
            validate_full_name(full_name)?;
        }
        if let Some(ref email) = update.email {
            validate_email(email)?;
        }
        if let Some(role_id) = update.role_id {
            self.ensure_role_exists(role_id).await?;
        }

        let mut patch = AccountUpdate::new();
        patch.full_name = update.full_name;
        patch.email = update.email;
        patch.role_id = update.role_id;

        let (old, new) = {
            let _guard = self.accounts_lock.lock().await;
            let old = self.existing_account(id).await?;
            if let Some(ref email) = patch.email {
                if self.accounts().email_exists(email, Some(id)).await? {
                    return Err(AccountError::DuplicateEmail);
                }
            }
            let new = self
                .accounts()
                .update(id, &patch, self.clock.now())
                .await
                .map_err(account_error)?
                .ok_or(AccountError::NotFound)?;
            (old, new)
        };

        info!(account_id = id, "Account updated");
        self.audit
            .record(
                caller,
                AuditEvent::new("update_user", "security")
                    .resource(id)
                    .old_value(snapshot(&old))
                    .new_value(snapshot(&new)),
            )
            .await;

        Ok(new)
    }

    /// Activate or deactivate an account.
    ///
    /// Deactivation also ends all of the account's sessions.
    pub async fn toggle_user_status(
        &self,
        caller: &Caller,
        id: i64,
        active: bool,
    ) -> Result<Account, AccountError> {
        let (old, new) = {
            let _guard = self.accounts_lock.lock().await;
            let old = self.existing_account(id).await?;
            let new = self
                .accounts()
                .update(id, &AccountUpdate::new().is_active(active), self.clock.now())
                .await?
                .ok_or(AccountError::NotFound)?;
            (old, new)
        };

        if !active {
            self.sessions.revoke_account(id, None).await?;
        }

        info!(account_id = id, active, "Account status changed");
        let action = if active { "activate_user" } else { "deactivate_user" };
        self.audit
            .record(
                caller,
                AuditEvent::new(action, "security")
                    .resource(id)
                    .old_value(json!({ "is_active": old.is_active }))
                    .new_value(json!({ "is_active": new.is_active })),
            )
            .await;

        Ok(new)
    }

    /// Replace an account's password with a generated temporary one.
    ///
    /// The account must change it at next login; any lockout is cleared and
    /// existing sessions are ended. Returns the temporary password, which is
    /// never stored or logged.
    pub async fn reset_user_password(
        &self,
        caller: &Caller,
        id: i64,
    ) -> Result<String, AccountError> {
        let temporary = generate_password(TEMPORARY_PASSWORD_LENGTH);
        let password_hash = self.hashing.hash(&temporary).await?;

        {
            let _guard = self.accounts_lock.lock().await;
            self.existing_account(id).await?;
            let repo = self.accounts();
            repo.update(
                id,
                &AccountUpdate::new()
                    .password_hash(password_hash)
                    .must_change_password(true)
                    .clear_lockout(),
                self.clock.now(),
            )
            .await?
            .ok_or(AccountError::NotFound)?;
        }

        self.sessions.revoke_account(id, None).await?;

        info!(account_id = id, "Password reset");
        self.audit
            .record(
                caller,
                AuditEvent::new("reset_password", "security")
                    .resource(id)
                    .new_value(json!({ "must_change_password": true, "login_attempts": 0 })),
            )
            .await;

        Ok(temporary)
    }

    /// Change the password of the account behind a bearer token.
    ///
    /// The token must resolve to a live session of an active account.
    /// Clears `must_change_password` on the account and its sessions.
    pub async fn change_password(
        &self,
        token: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AccountError> {
        let Some(session) = self.sessions.current_session(token).await? else {
            warn!("Password change rejected: no live session");
            return Err(AccountError::SessionExpired);
        };
        let caller = Caller::from_session(&session);
        let account = self.existing_account(session.account_id).await?;
        if !account.is_active {
            warn!(account_id = account.id, "Password change rejected: account inactive");
            return Err(AccountError::SessionExpired);
        }

        if !self
            .hashing
            .verify(current_password, &account.password_hash)
            .await
        {
            warn!(account_id = account.id, "Password change rejected: wrong current password");
            self.audit
                .record(
                    &caller,
                    AuditEvent::new("change_password", "auth")
                        .resource(account.id)
                        .failure(),
                )
                .await;
            return Err(AccountError::InvalidCurrentPassword);
        }

        validate_password(new_password, Some(&account.username))?;
        let password_hash = self.hashing.hash(new_password).await?;

        {
            let _guard = self.accounts_lock.lock().await;
            self.accounts()
                .update(
                    account.id,
                    &AccountUpdate::new()
                        .password_hash(password_hash)
                        .must_change_password(false),
                    self.clock.now(),
                )
                .await?
                .ok_or(AccountError::NotFound)?;
        }
        self.sessions.clear_must_change(account.id).await?;

        info!(account_id = account.id, "Password changed");
        self.audit
            .record(
                &caller,
                AuditEvent::new("change_password", "auth")
                    .resource(account.id)
                    .old_value(json!({ "must_change_password": account.must_change_password }))
                    .new_value(json!({ "must_change_password": false })),
            )
            .await;

        Ok(())
    }
}

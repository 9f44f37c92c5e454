//! Account model for steward.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered identity.
///
/// Accounts are never physically deleted; deactivation flips `is_active` so
/// that audit entries keep pointing at a real record.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account ID.
    pub id: i64,
    /// Login name (unique, case-insensitive).
    pub username: String,
    /// Email address (unique, case-insensitive).
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Assigned role.
    pub role_id: i64,
    /// Whether the account may authenticate.
    pub is_active: bool,
    /// Argon2 PHC string. Redacted whenever an account is audited.
    pub password_hash: String,
    /// Consecutive failed logins, within `0..=max_login_attempts`.
    pub login_attempts: u32,
    /// End of the current lockout window, if any.
    pub locked_until: Option<DateTime<Utc>>,
    /// Force a password change at next login.
    pub must_change_password: bool,
    /// Last successful login.
    pub last_login: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
    /// Username of the actor that created the account.
    pub created_by: String,
}

impl Account {
    /// Whether the account is inside a lockout window at `now`.
    pub fn is_locked_at(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| now < until)
    }
}

/// Data for creating a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Login name.
    pub username: String,
    /// Email address.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Assigned role.
    pub role_id: i64,
    /// Pre-computed password hash.
    pub password_hash: String,
    /// Force a password change at first login.
    pub must_change_password: bool,
    /// Username of the creating actor.
    pub created_by: String,
}

impl NewAccount {
    /// Create a new account draft with the required fields.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        full_name: impl Into<String>,
        role_id: i64,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            full_name: full_name.into(),
            role_id,
            password_hash: password_hash.into(),
            must_change_password: false,
            created_by: "system".to_string(),
        }
    }

    /// Force a password change at first login.
    pub fn with_must_change_password(mut self, must_change: bool) -> Self {
        self.must_change_password = must_change;
        self
    }

    /// Record who created the account.
    pub fn with_created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = created_by.into();
        self
    }
}

/// Data for updating an existing account.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    /// New display name.
    pub full_name: Option<String>,
    /// New email address.
    pub email: Option<String>,
    /// New role.
    pub role_id: Option<i64>,
    /// New active status.
    pub is_active: Option<bool>,
    /// New password hash.
    pub password_hash: Option<String>,
    /// New forced-change flag.
    pub must_change_password: Option<bool>,
    /// Reset `login_attempts` and `locked_until` in the same write.
    pub clear_lockout: bool,
}

impl AccountUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set new display name.
    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = Some(full_name.into());
        self
    }

    /// Set new email.
    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Set new role.
    pub fn role_id(mut self, role_id: i64) -> Self {
        self.role_id = Some(role_id);
        self
    }

    /// Set active status.
    pub fn is_active(mut self, is_active: bool) -> Self {
        self.is_active = Some(is_active);
        self
    }

    /// Set new password hash.
    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    /// Set forced-change flag.
    pub fn must_change_password(mut self, must_change: bool) -> Self {
        self.must_change_password = Some(must_change);
        self
    }

    /// Reset the lockout counter and window.
    pub fn clear_lockout(mut self) -> Self {
        self.clear_lockout = true;
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.email.is_none()
            && self.role_id.is_none()
            && self.is_active.is_none()
            && self.password_hash.is_none()
            && self.must_change_password.is_none()
            && !self.clear_lockout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_account() -> Account {
        let now = Utc::now();
        Account {
            id: 1,
            username: "alice".to_string(),
            email: "alice@x.com".to_string(),
            full_name: "Alice".to_string(),
            role_id: 3,
            is_active: true,
            password_hash: "$argon2id$v=19$m=8,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            login_attempts: 0,
            locked_until: None,
            must_change_password: false,
            last_login: None,
            created_at: now,
            updated_at: now,
            created_by: "admin".to_string(),
        }
    }

    #[test]
    fn test_new_account_builder() {
        let draft = NewAccount::new("bob", "bob@example.com", "Bob", 2, "hash")
            .with_must_change_password(true)
            .with_created_by("admin");

        assert_eq!(draft.username, "bob");
        assert_eq!(draft.email, "bob@example.com");
        assert_eq!(draft.role_id, 2);
        assert!(draft.must_change_password);
        assert_eq!(draft.created_by, "admin");
    }

    #[test]
    fn test_new_account_defaults() {
        let draft = NewAccount::new("bob", "bob@example.com", "Bob", 2, "hash");
        assert!(!draft.must_change_password);
        assert_eq!(draft.created_by, "system");
    }

    #[test]
    fn test_account_update_builder() {
        let update = AccountUpdate::new().full_name("New Name").is_active(false);
        assert!(update.full_name.is_some());
        assert!(update.is_active.is_some());
        assert!(update.password_hash.is_none());
        assert!(!update.is_empty());
        assert!(AccountUpdate::new().is_empty());
    }

    #[test]
    fn test_is_locked_at() {
        let now = Utc::now();
        let mut account = sample_account();
        assert!(!account.is_locked_at(now));

        account.locked_until = Some(now + Duration::minutes(30));
        assert!(account.is_locked_at(now));
        assert!(!account.is_locked_at(now + Duration::minutes(30)));
    }

    #[test]
    fn test_account_serializes_hash_field_name() {
        let value = serde_json::to_value(sample_account()).unwrap();
        assert!(value.get("password_hash").is_some());
        assert_eq!(value["username"], "alice");
    }
}

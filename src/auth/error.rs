//! Error types for account, authentication and role operations.

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::password::PasswordError;
use super::validation::ValidationError;
use crate::StewardError;

/// Account management errors.
#[derive(Error, Debug)]
pub enum AccountError {
    /// Username already taken (case-insensitive).
    #[error("username already exists")]
    DuplicateUsername,

    /// Email already used by another account (case-insensitive).
    #[error("email already exists")]
    DuplicateEmail,

    /// No account with the given ID.
    #[error("account not found")]
    NotFound,

    /// Referenced role does not exist.
    #[error("role not found")]
    RoleNotFound,

    /// Input rejected.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Password hashing failed.
    #[error("password error: {0}")]
    Password(#[from] PasswordError),

    /// The presented token has no live session.
    #[error("session expired or invalid")]
    SessionExpired,

    /// Current password did not match on a password change.
    #[error("current password is incorrect")]
    InvalidCurrentPassword,

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StewardError),
}

impl AccountError {
    /// Whether this error is a uniqueness violation.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            AccountError::DuplicateUsername | AccountError::DuplicateEmail
        )
    }
}

/// Authentication errors.
///
/// `AccountNotFound` and `InvalidCredentials` should be presented to users
/// identically.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No active account with the given username.
    #[error("invalid username or password")]
    AccountNotFound,

    /// The account is inside a lockout window.
    #[error("account is locked until {until}")]
    AccountLocked { until: DateTime<Utc> },

    /// Wrong password.
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StewardError),
}

/// Role management errors.
#[derive(Error, Debug)]
pub enum RoleError {
    /// Role name already taken (case-insensitive).
    #[error("role name already exists")]
    DuplicateName,

    /// No role with the given ID.
    #[error("role not found")]
    NotFound,

    /// Built-in roles cannot be deleted, renamed or have their permissions
    /// edited.
    #[error("system roles cannot be modified")]
    SystemRole,

    /// The role is still assigned to accounts.
    #[error("role is assigned to {0} account(s)")]
    InUse(i64),

    /// A permission ID is not in the catalog.
    #[error("unknown permission")]
    UnknownPermission,

    /// Input rejected.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Storage failure.
    #[error(transparent)]
    Storage(#[from] StewardError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_and_invalid_credentials_read_the_same() {
        assert_eq!(
            AuthError::AccountNotFound.to_string(),
            AuthError::InvalidCredentials.to_string()
        );
    }

    #[test]
    fn test_storage_is_transparent() {
        let err: AccountError = StewardError::Database("locked".to_string()).into();
        assert_eq!(err.to_string(), "database error: locked");
        assert!(!err.is_duplicate());
        assert!(AccountError::DuplicateEmail.is_duplicate());
    }

    #[test]
    fn test_role_in_use_message() {
        assert_eq!(
            RoleError::InUse(2).to_string(),
            "role is assigned to 2 account(s)"
        );
    }
}

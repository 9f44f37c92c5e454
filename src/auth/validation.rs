//! Input validation for account fields.
//!
//! This module provides validation functions for usernames, passwords,
//! display names, and email addresses.

use thiserror::Error;

/// Minimum username length.
pub const MIN_USERNAME_LENGTH: usize = 3;

/// Maximum username length.
pub const MAX_USERNAME_LENGTH: usize = 32;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum password length.
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum full name length.
pub const MAX_FULL_NAME_LENGTH: usize = 100;

/// Maximum email length.
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum role name length.
pub const MAX_ROLE_NAME_LENGTH: usize = 64;

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Username is too short.
    #[error("username must be at least {MIN_USERNAME_LENGTH} characters")]
    UsernameTooShort,

    /// Username is too long.
    #[error("username must be at most {MAX_USERNAME_LENGTH} characters")]
    UsernameTooLong,

    /// Username contains invalid characters.
    #[error("username can only contain letters, digits, '_', '.' and '-'")]
    UsernameInvalidChars,

    /// Password is too short.
    #[error("password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,

    /// Password is too long.
    #[error("password must be at most {MAX_PASSWORD_LENGTH} characters")]
    PasswordTooLong,

    /// Password is the same as username.
    #[error("password cannot be the same as username")]
    PasswordSameAsUsername,

    /// Full name is empty.
    #[error("full name cannot be empty")]
    FullNameEmpty,

    /// Full name is too long.
    #[error("full name must be at most {MAX_FULL_NAME_LENGTH} characters")]
    FullNameTooLong,

    /// Full name contains control characters.
    #[error("full name contains invalid characters")]
    FullNameInvalidChars,

    /// Email is too long.
    #[error("email must be at most {MAX_EMAIL_LENGTH} characters")]
    EmailTooLong,

    /// Email format is invalid.
    #[error("invalid email format")]
    EmailInvalidFormat,

    /// Role name is empty or too long.
    #[error("role name must be 1 to {MAX_ROLE_NAME_LENGTH} characters")]
    RoleNameInvalid,
}

/// Validate a username.
///
/// Requirements:
/// - Length: 3-32 characters
/// - Characters: ASCII letters, digits, `_`, `.` and `-`
///
/// # Examples
///
/// ```
/// use steward::auth::validation::validate_username;
///
/// assert!(validate_username("john.doe").is_ok());
/// assert!(validate_username("ab").is_err()); // too short
/// ```
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if username.len() < MIN_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooShort);
    }
    if username.len() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::UsernameTooLong);
    }

    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(ValidationError::UsernameInvalidChars);
    }

    Ok(())
}

/// Validate a password.
///
/// Requirements:
/// - Length: 8-128 characters
/// - Must not be the same as the username (if provided), ignoring case
pub fn validate_password(password: &str, username: Option<&str>) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    if len > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooLong);
    }

    if let Some(user) = username {
        if password.eq_ignore_ascii_case(user) {
            return Err(ValidationError::PasswordSameAsUsername);
        }
    }

    Ok(())
}

/// Validate a display name.
pub fn validate_full_name(full_name: &str) -> Result<(), ValidationError> {
    if full_name.trim().is_empty() {
        return Err(ValidationError::FullNameEmpty);
    }

    // Characters, not bytes
    if full_name.chars().count() > MAX_FULL_NAME_LENGTH {
        return Err(ValidationError::FullNameTooLong);
    }

    if full_name.chars().any(|c| c.is_control()) {
        return Err(ValidationError::FullNameInvalidChars);
    }

    Ok(())
}

/// Validate an email address.
///
/// Only a basic shape check: one `@`, a non-empty local part, and a dotted
/// domain without empty labels.
///
/// # Examples
///
/// ```
/// use steward::auth::validation::validate_email;
///
/// assert!(validate_email("user@example.com").is_ok());
/// assert!(validate_email("invalid").is_err());
/// ```
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.len() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::EmailTooLong);
    }

    if email.chars().any(|c| c.is_whitespace()) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    let Some((local, domain)) = email.split_once('@') else {
        return Err(ValidationError::EmailInvalidFormat);
    };

    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(ValidationError::EmailInvalidFormat);
    }

    if domain.split('.').any(str::is_empty) {
        return Err(ValidationError::EmailInvalidFormat);
    }

    Ok(())
}

/// Validate a role name.
pub fn validate_role_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_ROLE_NAME_LENGTH {
        return Err(ValidationError::RoleNameInvalid);
    }
    Ok(())
}

/// Validate all fields of a new account at once.
///
/// Returns the first validation error encountered.
pub fn validate_new_account(
    username: &str,
    email: &str,
    full_name: &str,
    password: &str,
) -> Result<(), ValidationError> {
    validate_username(username)?;
    validate_email(email)?;
    validate_full_name(full_name)?;
    validate_password(password, Some(username))?;
    Ok(())
}

//! Authentication and authorization for steward.
//!
//! This module provides credential hashing, the lockout state machine,
//! session management, the permission catalog and input validation.

mod error;
mod hashing;
pub mod lockout;
mod password;
pub mod permission;
mod session;
pub mod validation;

pub use error::{AccountError, AuthError, RoleError};
pub use hashing::{generate_password, HashingPool, TEMPORARY_PASSWORD_LENGTH};
pub use lockout::{FailureTransition, LockState, LockoutPolicy};
pub use password::{Argon2Hasher, CredentialHasher, PasswordError};
pub use permission::{has_permission, Action, Module, PermissionDef, SystemRole, CATALOG};
pub use session::{hash_token, Session, SessionManager, DEFAULT_IDLE_TIMEOUT_SECS};
pub use validation::ValidationError;

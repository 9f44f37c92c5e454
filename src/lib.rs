//! steward - identity and access-control core.
//!
//! Account storage, credential verification, session lifecycle,
//! role/permission authorization and audit logging for a small business
//! application. Everything else calls in through [`IdentityService`].

pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod service;

pub use audit::{AuditEvent, AuditFilter, AuditLogEntry, AuditStatus, Caller};
pub use auth::{
    AccountError, Action, Argon2Hasher, AuthError, CredentialHasher, Module, PasswordError,
    RoleError, Session, ValidationError,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{Account, Database, NewRole, Permission, Role, RoleUpdate};
pub use error::{Result, StewardError};
pub use service::{IdentityService, NewUserRequest, UserUpdate};

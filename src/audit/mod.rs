//! Audit logging for steward.
//!
//! Every account and role mutation, every authentication attempt and any
//! caller-supplied business event ends up as an append-only entry attributed
//! to a [`Caller`]. Credential values are redacted before storage.

mod logger;
mod redact;

pub use logger::{AuditLogger, DEFAULT_RETENTION};
pub use redact::{redact, redacted, REDACTED};

use serde::Serialize;
use serde_json::Value;

use crate::auth::Session;
pub use crate::db::{AuditFilter, AuditLogEntry, AuditStatus};

/// Username recorded when no session is attached.
pub const ANONYMOUS: &str = "anonymous";

/// Who is performing an operation, and from where.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    pub user_id: Option<i64>,
    pub username: Option<String>,
    /// Network origin, e.g. a client IP address.
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

impl Caller {
    /// A caller without a session.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// The identity behind a session.
    pub fn from_session(session: &Session) -> Self {
        Self::account(session.account_id, &session.username)
    }

    /// An explicit account identity.
    pub fn account(user_id: i64, username: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id),
            username: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Same origin and user agent, attributed to another account.
    pub(crate) fn as_account(&self, user_id: i64, username: &str) -> Self {
        Self {
            user_id: Some(user_id),
            username: Some(username.to_string()),
            origin: self.origin.clone(),
            user_agent: self.user_agent.clone(),
        }
    }

    /// Name recorded in audit entries.
    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(ANONYMOUS)
    }
}

/// An audit event before attribution.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    pub action: String,
    pub module: String,
    pub resource_id: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub status: AuditStatus,
}

impl AuditEvent {
    /// A successful event with no resource or snapshots.
    pub fn new(action: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            module: module.into(),
            resource_id: None,
            old_value: None,
            new_value: None,
            status: AuditStatus::Success,
        }
    }

    pub fn resource(mut self, resource_id: impl ToString) -> Self {
        self.resource_id = Some(resource_id.to_string());
        self
    }

    pub fn old_value(mut self, value: Value) -> Self {
        self.old_value = Some(value);
        self
    }

    pub fn new_value(mut self, value: Value) -> Self {
        self.new_value = Some(value);
        self
    }

    pub fn status(mut self, status: AuditStatus) -> Self {
        self.status = status;
        self
    }

    pub fn failure(self) -> Self {
        self.status(AuditStatus::Failure)
    }

    pub fn warning(self) -> Self {
        self.status(AuditStatus::Warning)
    }
}

/// Serialize a record into an audit snapshot.
///
/// Falls back to `null` for values that cannot be represented as JSON.
pub fn snapshot<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

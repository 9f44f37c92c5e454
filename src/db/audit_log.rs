//! Audit log model for steward.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome recorded with an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    #[default]
    Success,
    Failure,
    Warning,
}

impl AuditStatus {
    /// Stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Success => "success",
            AuditStatus::Failure => "failure",
            AuditStatus::Warning => "warning",
        }
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(AuditStatus::Success),
            "failure" => Ok(AuditStatus::Failure),
            "warning" => Ok(AuditStatus::Warning),
            other => Err(format!("unknown audit status: {other}")),
        }
    }
}

/// A stored audit entry. Entries are never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub id: i64,
    /// Acting account, None for anonymous actions.
    pub user_id: Option<i64>,
    /// Acting username, "anonymous" when there is no session.
    pub username: String,
    pub action: String,
    pub module: String,
    pub resource_id: Option<String>,
    /// Redacted snapshot before the change.
    pub old_value: Option<Value>,
    /// Redacted snapshot after the change.
    pub new_value: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub status: AuditStatus,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

/// An audit entry ready to be appended.
#[derive(Debug, Clone)]
pub struct NewAuditLogEntry {
    pub user_id: Option<i64>,
    pub username: String,
    pub action: String,
    pub module: String,
    pub resource_id: Option<String>,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub status: AuditStatus,
    pub origin: Option<String>,
    pub user_agent: Option<String>,
}

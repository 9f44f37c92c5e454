//! Role and permission models for steward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An atomic authorization unit: (module, action, resource?).
///
/// Stored as strings so the catalog can grow without a schema change; see
/// `auth::permission` for the typed catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct Permission {
    /// Unique permission ID.
    pub id: i64,
    /// Functional area, e.g. "customers".
    pub module: String,
    /// Verb, e.g. "view".
    pub action: String,
    /// Optional sub-scope qualifier.
    pub resource: Option<String>,
    /// Human readable description.
    pub description: String,
}

impl Permission {
    /// Whether this permission grants `action` on `module` (and `resource`).
    ///
    /// A permission without a resource qualifier covers every resource of
    /// the module; a qualified one only matches that exact resource.
    pub fn grants(&self, module: &str, action: &str, resource: Option<&str>) -> bool {
        if self.module != module || self.action != action {
            return false;
        }
        match self.resource.as_deref() {
            None => true,
            Some(own) => resource == Some(own),
        }
    }

    /// The identifying triple.
    pub fn key(&self) -> (&str, &str, Option<&str>) {
        (&self.module, &self.action, self.resource.as_deref())
    }
}

/// A named bundle of permissions.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    /// Unique role ID.
    pub id: i64,
    /// Role name (unique, case-insensitive).
    pub name: String,
    /// Description.
    pub description: String,
    /// Built-in role; never deleted.
    pub is_system: bool,
    /// Granted permissions, ordered by permission ID.
    pub permissions: Vec<Permission>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// IDs of the granted permissions.
    pub fn permission_ids(&self) -> Vec<i64> {
        self.permissions.iter().map(|p| p.id).collect()
    }
}

/// Data for creating a new role.
#[derive(Debug, Clone)]
pub struct NewRole {
    /// Role name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Permission IDs to grant; duplicates are collapsed.
    pub permission_ids: Vec<i64>,
    /// Built-in role flag.
    pub is_system: bool,
}

impl NewRole {
    /// Create a custom (non-system) role draft.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            permission_ids: Vec::new(),
            is_system: false,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the granted permissions.
    pub fn with_permissions(mut self, permission_ids: impl IntoIterator<Item = i64>) -> Self {
        self.permission_ids = permission_ids.into_iter().collect();
        self
    }

    /// Mark as a built-in role.
    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// Data for updating an existing role.
#[derive(Debug, Clone, Default)]
pub struct RoleUpdate {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement permission set.
    pub permission_ids: Option<Vec<i64>>,
}

impl RoleUpdate {
    /// Create an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set new name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set new description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Replace the permission set.
    pub fn permissions(mut self, permission_ids: impl IntoIterator<Item = i64>) -> Self {
        self.permission_ids = Some(permission_ids.into_iter().collect());
        self
    }

    /// Check if any fields are set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.permission_ids.is_none()
    }
}

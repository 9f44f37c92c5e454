//! Role repository for steward.
//!
//! Owns the `permissions`, `roles` and `role_permissions` tables. A role's
//! permission set is always replaced as a whole inside one transaction.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use super::role::{NewRole, Permission, Role, RoleUpdate};
use super::DbPool;
use crate::{Result, StewardError};

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: String,
    is_system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RoleRow {
    fn into_role(self, permissions: Vec<Permission>) -> Role {
        Role {
            id: self.id,
            name: self.name,
            description: self.description,
            is_system: self.is_system,
            permissions,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Collapse duplicates and order by ID.
fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect()
}

/// Replace the permission set of a role on an open connection/transaction.
async fn replace_permissions(
    conn: &mut SqliteConnection,
    role_id: i64,
    permission_ids: &[i64],
) -> Result<()> {
    let ids = dedup_ids(permission_ids);

    for id in &ids {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM permissions WHERE id = ?)")
                .bind(id)
                .fetch_one(&mut *conn)
                .await?;
        if !exists {
            return Err(StewardError::NotFound(format!("permission {id}")));
        }
    }

    sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;

    for id in ids {
        sqlx::query("INSERT INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

/// Repository for roles and the permission catalog.
pub struct RoleRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> RoleRepository<'a> {
    /// Create a new RoleRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    // --- permissions ---

    /// Insert a permission if its triple is not present yet, returning the
    /// stored row either way.
    pub async fn ensure_permission(
        &self,
        module: &str,
        action: &str,
        resource: Option<&str>,
        description: &str,
    ) -> Result<Permission> {
        sqlx::query(
            "INSERT OR IGNORE INTO permissions (module, action, resource, description)
             VALUES (?, ?, ?, ?)",
        )
        .bind(module)
        .bind(action)
        .bind(resource)
        .bind(description)
        .execute(self.pool)
        .await?;

        let permission = sqlx::query_as::<_, Permission>(
            "SELECT id, module, action, resource, description FROM permissions
             WHERE module = ? AND action = ? AND COALESCE(resource, '') = COALESCE(?, '')",
        )
        .bind(module)
        .bind(action)
        .bind(resource)
        .fetch_one(self.pool)
        .await?;
        Ok(permission)
    }

    /// List the full permission catalog ordered by ID.
    pub async fn list_permissions(&self) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT id, module, action, resource, description FROM permissions ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;
        Ok(permissions)
    }

    async fn permissions_for(&self, role_id: i64) -> Result<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT p.id, p.module, p.action, p.resource, p.description
             FROM permissions p
             JOIN role_permissions rp ON rp.permission_id = p.id
             WHERE rp.role_id = ?
             ORDER BY p.id",
        )
        .bind(role_id)
        .fetch_all(self.pool)
        .await?;
        Ok(permissions)
    }

    // --- roles ---

    /// Create a role and its permission set atomically.
    ///
    /// Returns `Conflict("name")` on a duplicate name and `NotFound` when a
    /// permission ID is unknown; nothing is written in either case.
    pub async fn create(&self, new_role: &NewRole, now: DateTime<Utc>) -> Result<Role> {
        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO roles (name, description, is_system, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&new_role.name)
        .bind(&new_role.description)
        .bind(new_role.is_system)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| StewardError::from_write(e, "name"))?;

        replace_permissions(&mut tx, id, &new_role.permission_ids).await?;
        tx.commit().await?;

        debug!(role_id = id, name = %new_role.name, "Role created");

        self.get_by_id(id)
            .await?
            .ok_or_else(|| StewardError::NotFound("role".to_string()))
    }

    /// Get a role by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Role>> {
        let row = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, is_system, created_at, updated_at
             FROM roles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        match row {
            Some(row) => {
                let permissions = self.permissions_for(row.id).await?;
                Ok(Some(row.into_role(permissions)))
            }
            None => Ok(None),
        }
    }

    /// Get a role by name (case-insensitive).
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Role>> {
        let id: Option<i64> =
            sqlx::query_scalar("SELECT id FROM roles WHERE name = ? COLLATE NOCASE")
                .bind(name)
                .fetch_optional(self.pool)
                .await?;

        match id {
            Some(id) => self.get_by_id(id).await,
            None => Ok(None),
        }
    }

    /// List all roles ordered by ID.
    pub async fn list_all(&self) -> Result<Vec<Role>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            "SELECT id, name, description, is_system, created_at, updated_at
             FROM roles ORDER BY id",
        )
        .fetch_all(self.pool)
        .await?;

        let mut roles = Vec::with_capacity(rows.len());
        for row in rows {
            let permissions = self.permissions_for(row.id).await?;
            roles.push(row.into_role(permissions));
        }
        Ok(roles)
    }

    /// Update a role by ID. The permission set, when given, replaces the
    /// existing one. Returns None if the role does not exist.
    pub async fn update(
        &self,
        id: i64,
        update: &RoleUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Role>> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE roles SET name = COALESCE(?, name), description = COALESCE(?, description),
                              updated_at = ?
             WHERE id = ?",
        )
        .bind(update.name.as_deref())
        .bind(update.description.as_deref())
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| StewardError::from_write(e, "name"))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        if let Some(ref permission_ids) = update.permission_ids {
            replace_permissions(&mut tx, id, permission_ids).await?;
        }
        tx.commit().await?;

        self.get_by_id(id).await
    }

    /// Delete a role by ID. Returns true if a row was removed.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

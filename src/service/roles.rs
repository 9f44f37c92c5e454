//! Role management operations.

use tracing::info;

use super::IdentityService;
use crate::audit::{snapshot, AuditEvent, Caller};
use crate::auth::validation::validate_role_name;
use crate::auth::RoleError;
use crate::db::{AccountRepository, NewRole, Permission, Role, RoleRepository, RoleUpdate};
use crate::StewardError;

fn role_error(e: StewardError) -> RoleError {
    match e {
        StewardError::Conflict(_) => RoleError::DuplicateName,
        StewardError::NotFound(what) if what.starts_with("permission") => {
            RoleError::UnknownPermission
        }
        other => RoleError::Storage(other),
    }
}

impl IdentityService {
    fn role_repo(&self) -> RoleRepository<'_> {
        RoleRepository::new(self.db.pool())
    }

    /// All roles with their permissions, ordered by ID.
    pub async fn roles(&self) -> Result<Vec<Role>, RoleError> {
        Ok(self.role_repo().list_all().await?)
    }

    /// The full permission catalog.
    pub async fn permissions(&self) -> Result<Vec<Permission>, RoleError> {
        Ok(self.role_repo().list_permissions().await?)
    }

    /// Create a custom role. Duplicate permission IDs are collapsed.
    pub async fn create_role(&self, caller: &Caller, draft: NewRole) -> Result<Role, RoleError> {
        validate_role_name(&draft.name)?;
        let draft = NewRole {
            name: draft.name.trim().to_string(),
            is_system: false,
            ..draft
        };

        let role = {
            let _guard = self.roles_lock.lock().await;
            let repo = self.role_repo();
            if repo.get_by_name(&draft.name).await?.is_some() {
                return Err(RoleError::DuplicateName);
            }
            repo.create(&draft, self.clock.now())
                .await
                .map_err(role_error)?
        };

        info!(role_id = role.id, name = %role.name, "Role created");
        self.audit
            .record(
                caller,
                AuditEvent::new("create_role", "security")
                    .resource(role.id)
                    .new_value(snapshot(&role)),
            )
            .await;

        Ok(role)
    }

    /// Update a role's name, description or permission set.
    ///
    /// Built-in roles only accept a new description; their names and
    /// permissions are derived from the catalog.
    pub async fn update_role(
        &self,
        caller: &Caller,
        id: i64,
        mut update: RoleUpdate,
    ) -> Result<Role, RoleError> {
        if let Some(ref name) = update.name {
            validate_role_name(name)?;
            update.name = Some(name.trim().to_string());
        }

        let (old, new) = {
            let _guard = self.roles_lock.lock().await;
            let repo = self.role_repo();
            let old = repo.get_by_id(id).await?.ok_or(RoleError::NotFound)?;

            if old.is_system && (update.name.is_some() || update.permission_ids.is_some()) {
                return Err(RoleError::SystemRole);
            }
            if let Some(ref name) = update.name {
                if let Some(other) = repo.get_by_name(name).await? {
                    if other.id != id {
                        return Err(RoleError::DuplicateName);
                    }
                }
            }

            let new = repo
                .update(id, &update, self.clock.now())
                .await
                .map_err(role_error)?
                .ok_or(RoleError::NotFound)?;
            (old, new)
        };

        info!(role_id = id, name = %new.name, "Role updated");
        self.audit
            .record(
                caller,
                AuditEvent::new("update_role", "security")
                    .resource(id)
                    .old_value(snapshot(&old))
                    .new_value(snapshot(&new)),
            )
            .await;

        Ok(new)
    }

    /// Delete a custom role that no account is assigned to.
    pub async fn delete_role(&self, caller: &Caller, id: i64) -> Result<(), RoleError> {
        let old = {
            let _guard = self.roles_lock.lock().await;
            let repo = self.role_repo();
            let old = repo.get_by_id(id).await?.ok_or(RoleError::NotFound)?;
            if old.is_system {
                return Err(RoleError::SystemRole);
            }

            let assigned = AccountRepository::new(self.db.pool())
                .count_by_role(id)
                .await?;
            if assigned > 0 {
                return Err(RoleError::InUse(assigned));
            }

            repo.delete(id).await?;
            old
        };

        info!(role_id = id, name = %old.name, "Role deleted");
        self.audit
            .record(
                caller,
                AuditEvent::new("delete_role", "security")
                    .resource(id)
                    .old_value(snapshot(&old)),
            )
            .await;

        Ok(())
    }
}

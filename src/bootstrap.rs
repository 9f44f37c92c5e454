//! First-run seeding.
//!
//! Idempotent: safe to run on every start. Catalog entries missing from the
//! database are added, the built-in roles are (re)derived from the full
//! catalog, and the default administrator is created only when the store
//! has no administrator yet. Each change is audited under the `system`
//! name.

use serde_json::json;
use tracing::{info, warn};

use crate::audit::{snapshot, AuditEvent, Caller};
use crate::auth::{AccountError, SystemRole, CATALOG};
use crate::config::BootstrapConfig;
use crate::db::{AccountRepository, NewRole, RoleRepository, RoleUpdate};
use crate::service::{IdentityService, NewUserRequest};
use crate::{Result, StewardError};

/// Name bootstrap changes are attributed to.
pub const SYSTEM: &str = "system";

/// What a bootstrap run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Catalog entries inserted by this run.
    pub permissions_added: usize,
    /// Built-in roles created by this run.
    pub roles_created: Vec<String>,
    /// Built-in roles whose permission set was corrected.
    pub roles_rederived: Vec<String>,
    /// Whether the default administrator was created.
    pub admin_created: bool,
}

/// Seed the permission catalog, built-in roles and default administrator.
pub async fn run(service: &IdentityService, config: &BootstrapConfig) -> Result<BootstrapReport> {
    let mut report = BootstrapReport::default();
    let system = Caller {
        username: Some(SYSTEM.to_string()),
        ..Caller::default()
    };
    let pool = service.database().pool();
    let roles = RoleRepository::new(pool);
    let now = service.clock().now();

    let before = roles.list_permissions().await?.len();
    for def in CATALOG {
        roles
            .ensure_permission(def.module.as_str(), def.action.as_str(), None, def.description)
            .await?;
    }
    let catalog = roles.list_permissions().await?;
    report.permissions_added = catalog.len() - before;
    if report.permissions_added > 0 {
        service
            .audit()
            .record(
                &system,
                AuditEvent::new("seed_permissions", "security")
                    .new_value(json!({ "added": report.permissions_added })),
            )
            .await;
    }

    let mut admin_role_id = None;
    for system_role in SystemRole::ALL {
        let derived: Vec<i64> = system_role.derive(&catalog).iter().map(|p| p.id).collect();

        let role = match roles.get_by_name(system_role.name()).await? {
            None => {
                let role = roles
                    .create(
                        &NewRole::new(system_role.name())
                            .with_description(system_role.description())
                            .with_permissions(derived)
                            .system(),
                        now,
                    )
                    .await?;
                report.roles_created.push(role.name.clone());
                service
                    .audit()
                    .record(
                        &system,
                        AuditEvent::new("create_role", "security")
                            .resource(role.id)
                            .new_value(snapshot(&role)),
                    )
                    .await;
                role
            }
            Some(existing) if existing.permission_ids() != derived => {
                if !existing.is_system {
                    warn!(name = %existing.name, "Re-deriving a role that is not marked as built-in");
                }
                let role = roles
                    .update(existing.id, &RoleUpdate::new().permissions(derived), now)
                    .await?
                    .ok_or_else(|| StewardError::NotFound("role".to_string()))?;
                report.roles_rederived.push(role.name.clone());
                service
                    .audit()
                    .record(
                        &system,
                        AuditEvent::new("update_role", "security")
                            .resource(role.id)
                            .old_value(snapshot(&existing))
                            .new_value(snapshot(&role)),
                    )
                    .await;
                role
            }
            Some(existing) => existing,
        };

        if system_role == SystemRole::Administrator {
            admin_role_id = Some(role.id);
        }
    }

    let admin_role_id =
        admin_role_id.ok_or_else(|| StewardError::NotFound("Administrator role".to_string()))?;
    let accounts = AccountRepository::new(pool);
    if accounts.count_by_role(admin_role_id).await? == 0
        && !accounts.username_exists(&config.admin_username).await?
    {
        let request = NewUserRequest::new(
            &config.admin_username,
            &config.admin_email,
            &config.admin_full_name,
            &config.admin_password,
            admin_role_id,
        )
        .with_must_change_password(true);

        service
            .create_user(&system, request)
            .await
            .map_err(|e| match e {
                AccountError::Storage(inner) => inner,
                other => StewardError::Config(format!("default administrator: {other}")),
            })?;
        report.admin_created = true;
        warn!(
            username = %config.admin_username,
            "Default administrator created; the password must be changed at first login"
        );
    }

    info!(
        permissions_added = report.permissions_added,
        roles_created = report.roles_created.len(),
        roles_rederived = report.roles_rederived.len(),
        admin_created = report.admin_created,
        "Bootstrap complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::service::test_support::cheap_config;
    use crate::service::test_support::service;

    #[tokio::test]
    async fn test_bootstrap_seeds_roles_and_admin() {
        let (service, _) = service().await;

        let roles = service.roles().await.unwrap();
        let names: Vec<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Administrator", "Manager", "Staff"]);
        assert!(roles.iter().all(|r| r.is_system));
        assert_eq!(roles[0].permissions.len(), CATALOG.len());

        let users = service.users().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].username, "admin");
        assert!(users[0].must_change_password);
        assert_eq!(users[0].role_id, roles[0].id);
        assert_eq!(users[0].created_by, "system");
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let (service, _) = service().await;
        let config = cheap_config();
        let audited = service.audit().count().await.unwrap();

        let report = run(&service, &config.bootstrap).await.unwrap();
        assert_eq!(report, BootstrapReport::default());
        assert_eq!(service.audit().count().await.unwrap(), audited);
        assert_eq!(service.roles().await.unwrap().len(), 3);
        assert_eq!(service.users().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_rederives_drifted_role() {
        let (service, _) = service().await;
        let staff = service
            .roles()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.name == "Staff")
            .unwrap();
        RoleRepository::new(service.database().pool())
            .update(staff.id, &RoleUpdate::new().permissions([]), service.clock().now())
            .await
            .unwrap();

        let report = run(&service, &cheap_config().bootstrap).await.unwrap();
        assert_eq!(report.roles_rederived, vec!["Staff".to_string()]);
        let entries = service
            .audit_logs(&AuditFilter::new().action("update_role"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].username, SYSTEM);
        assert_eq!(entries[0].resource_id, Some(staff.id.to_string()));
        assert!(entries[0].old_value.as_ref().unwrap()["permissions"]
            .as_array()
            .unwrap()
            .is_empty());
        let staff = service
            .roles()
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.name == "Staff")
            .unwrap();
        assert_eq!(staff.permission_ids(), {
            let catalog = service.permissions().await.unwrap();
            SystemRole::Staff
                .derive(&catalog)
                .iter()
                .map(|p| p.id)
                .collect::<Vec<_>>()
        });
    }
}

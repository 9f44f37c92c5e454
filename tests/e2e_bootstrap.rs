//! E2E tests for first-run seeding.

mod common;

use std::collections::HashSet;

use common::{setup, ADMIN_PASSWORD, ADMIN_USERNAME};
use steward::auth::{SystemRole, CATALOG};
use steward::bootstrap::{self, BootstrapReport};
use steward::{AuditFilter, Caller, Clock, RoleUpdate};

/// A fresh store ends up with the three built-in roles and one administrator.
#[tokio::test]
async fn test_fresh_store_is_seeded() {
    let env = setup().await;
    assert_eq!(env.report.permissions_added, CATALOG.len());
    assert_eq!(
        env.report.roles_created,
        vec!["Administrator", "Manager", "Staff"]
    );
    assert!(env.report.admin_created);

    let roles = env.service.roles().await.unwrap();
    for system_role in SystemRole::ALL {
        let matching = roles.iter().filter(|r| r.name == system_role.name()).count();
        assert_eq!(matching, 1, "{}", system_role.name());
    }

    let users = env.service.users().await.unwrap();
    assert_eq!(users.len(), 1);
    let admin = &users[0];
    assert_eq!(admin.username, ADMIN_USERNAME);
    assert!(admin.must_change_password);
    assert!(admin.is_active);
    assert_eq!(admin.role_id, env.role("Administrator").await.id);

    let role_entries = env
        .service
        .audit_logs(&AuditFilter::new().action("create_role"))
        .await
        .unwrap();
    let mut audited: Vec<_> = role_entries
        .iter()
        .map(|e| {
            assert_eq!(e.username, "system");
            e.new_value.as_ref().unwrap()["name"].as_str().unwrap().to_string()
        })
        .collect();
    audited.sort();
    assert_eq!(audited, vec!["Administrator", "Manager", "Staff"]);

    let seeded = env
        .service
        .audit_logs(&AuditFilter::new().action("seed_permissions"))
        .await
        .unwrap();
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded[0].new_value.as_ref().unwrap()["added"], CATALOG.len());
}

/// The default credentials log in and carry the full Administrator set.
#[tokio::test]
async fn test_default_admin_session() {
    let env = setup().await;
    let session = env
        .service
        .authenticate(ADMIN_USERNAME, ADMIN_PASSWORD, &Caller::anonymous())
        .await
        .unwrap();
    assert!(session.must_change_password);

    let administrator = env.role("Administrator").await;
    let granted: HashSet<i64> = session.permissions.iter().map(|p| p.id).collect();
    let expected: HashSet<i64> = administrator.permissions.iter().map(|p| p.id).collect();
    assert_eq!(granted, expected);
    assert_eq!(granted.len(), CATALOG.len());
}

/// Running again changes nothing.
#[tokio::test]
async fn test_bootstrap_rerun_is_noop() {
    let env = setup().await;
    let report = bootstrap::run(&env.service, &env.config.bootstrap)
        .await
        .unwrap();
    assert_eq!(report, BootstrapReport::default());
    assert_eq!(env.service.users().await.unwrap().len(), 1);
    assert_eq!(env.service.roles().await.unwrap().len(), 3);
    assert_eq!(
        env.service.permissions().await.unwrap().len(),
        CATALOG.len()
    );
}

/// A built-in role that drifted from the catalog is re-derived and audited.
#[tokio::test]
async fn test_drifted_role_rederived_and_audited() {
    let env = setup().await;
    let manager = env.role("Manager").await;
    let view = manager.permissions[0].id;

    // Bypass the service, which refuses to edit built-in roles.
    let repo = steward::db::RoleRepository::new(env.service.database().pool());
    repo.update(
        manager.id,
        &RoleUpdate::new().permissions([view]),
        env.clock.now(),
    )
    .await
    .unwrap();

    let report = bootstrap::run(&env.service, &env.config.bootstrap)
        .await
        .unwrap();
    assert_eq!(report.roles_rederived, vec!["Manager"]);
    assert_eq!(
        env.role("Manager").await.permissions,
        manager.permissions
    );

    let entries = env
        .service
        .audit_logs(&AuditFilter::new().action("update_role"))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].username, "system");
    assert!(entries[0].user_id.is_none());
    assert_eq!(
        entries[0].old_value.as_ref().unwrap()["permissions"]
            .as_array()
            .unwrap()
            .len(),
        1
    );
}

/// The administrator creation is attributed to the system and its hash is redacted.
#[tokio::test]
async fn test_admin_creation_is_audited() {
    let env = setup().await;
    let entries = env
        .service
        .audit_logs(&AuditFilter::new().action("create_user"))
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].username, "system");

    let stored = env
        .service
        .find_by_username(ADMIN_USERNAME)
        .await
        .unwrap()
        .unwrap()
        .password_hash;
    let new_value = entries[0].new_value.as_ref().unwrap().to_string();
    assert!(!new_value.contains(&stored));
    assert!(!new_value.contains(ADMIN_PASSWORD));
}

/// No second administrator is created once one exists.
#[tokio::test]
async fn test_admin_not_recreated_when_admin_exists() {
    let env = setup().await;
    let admin = env
        .service
        .find_by_username(ADMIN_USERNAME)
        .await
        .unwrap()
        .unwrap();

    let mut config = env.config.bootstrap.clone();
    config.admin_username = "root".to_string();
    config.admin_email = "root@x.com".to_string();
    let report = bootstrap::run(&env.service, &config).await.unwrap();
    assert!(!report.admin_created);

    let users = env.service.users().await.unwrap();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].id, admin.id);
}

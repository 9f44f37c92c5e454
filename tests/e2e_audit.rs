//! E2E tests for the audit trail.

mod common;

use chrono::Duration;
use common::{setup, ADMIN_PASSWORD};
use serde_json::json;
use steward::audit::{DEFAULT_RETENTION, REDACTED};
use steward::{AuditEvent, AuditFilter, AuditStatus, Caller, Clock};

/// Appending past the retention limit evicts the oldest entries.
#[tokio::test]
async fn test_retention_keeps_newest_entries() {
    let env = setup().await;
    let caller = Caller::anonymous();
    let total = DEFAULT_RETENTION + 50;

    for i in 1..=total {
        env.service
            .log_action(&caller, AuditEvent::new("view", "reports").resource(i))
            .await
            .unwrap();
    }

    assert_eq!(
        env.service.audit().count().await.unwrap(),
        DEFAULT_RETENTION as i64
    );
    let entries = env.service.audit_logs(&AuditFilter::new()).await.unwrap();
    assert_eq!(entries.len(), DEFAULT_RETENTION);
    assert_eq!(
        entries.first().unwrap().resource_id.as_deref(),
        Some(total.to_string().as_str())
    );
    assert_eq!(entries.last().unwrap().resource_id.as_deref(), Some("51"));
    assert!(env
        .service
        .audit_logs(&AuditFilter::new().action("create_user"))
        .await
        .unwrap()
        .is_empty());
}

/// Secrets never reach the store, however the caller nests them.
#[tokio::test]
async fn test_secrets_are_redacted() {
    let env = setup().await;
    env.create_user("dana", "dana-pass-1", "Staff").await;

    let created = &env
        .service
        .audit_logs(&AuditFilter::new().action("create_user"))
        .await
        .unwrap()[0];
    assert_eq!(created.new_value.as_ref().unwrap()["username"], "dana");
    let dana = env.service.find_by_username("dana").await.unwrap().unwrap();
    let text = serde_json::to_string(created).unwrap();
    assert!(!text.contains(&dana.password_hash));
    assert!(!text.contains("dana-pass-1"));

    env.service
        .log_action(
            &Caller::anonymous(),
            AuditEvent::new("import", "settings").new_value(json!({
                "source": "legacy",
                "rows": [{ "user": "x", "Password": "hunter22" }],
                "api": { "Token": "abc", "secret": "s" },
            })),
        )
        .await
        .unwrap();
    let entry = &env
        .service
        .audit_logs(&AuditFilter::new().action("import"))
        .await
        .unwrap()[0];
    let value = entry.new_value.as_ref().unwrap();
    assert_eq!(value["source"], "legacy");
    assert_eq!(value["rows"][0]["user"], "x");
    assert_eq!(value["rows"][0]["Password"], REDACTED);
    assert_eq!(value["api"]["Token"], REDACTED);
    assert_eq!(value["api"]["secret"], REDACTED);
}

/// Every mutating operation leaves an attributed entry.
#[tokio::test]
async fn test_operations_are_attributed() {
    let env = setup().await;
    let admin = env.admin_session().await;
    let caller = Caller::from_session(&admin).with_user_agent("desk-client/2.1");

    let id = env.create_user("eve", "eve-pass-12", "Staff").await;
    env.service
        .change_password(&admin.token, ADMIN_PASSWORD, "brand-new-1")
        .await
        .unwrap();
    env.service
        .reset_user_password(&caller, id)
        .await
        .unwrap();

    let resets = env
        .service
        .audit_logs(&AuditFilter::new().action("reset_password"))
        .await
        .unwrap();
    assert_eq!(resets.len(), 1);
    assert_eq!(resets[0].user_id, Some(admin.account_id));
    assert_eq!(resets[0].username, "admin");
    assert_eq!(resets[0].resource_id.as_deref(), Some(id.to_string().as_str()));
    assert_eq!(resets[0].user_agent.as_deref(), Some("desk-client/2.1"));

    let changes = env
        .service
        .audit_logs(&AuditFilter::new().action("change_password").user_id(admin.account_id))
        .await
        .unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].status, AuditStatus::Success);
}

/// Filters combine and results come back newest first.
#[tokio::test]
async fn test_query_filters() {
    let env = setup().await;
    let caller = Caller::account(7, "clerk");
    let start = env.clock.now();

    for i in 0..3 {
        env.clock.advance(Duration::minutes(1));
        env.service
            .log_action(&caller, AuditEvent::new("edit", "orders").resource(i))
            .await
            .unwrap();
    }
    env.service
        .log_action(&caller, AuditEvent::new("edit", "orders").failure())
        .await
        .unwrap();

    let orders = env
        .service
        .audit_logs(&AuditFilter::new().module("orders").status(AuditStatus::Success))
        .await
        .unwrap();
    let resources: Vec<_> = orders
        .iter()
        .map(|e| e.resource_id.clone().unwrap())
        .collect();
    assert_eq!(resources, vec!["2", "1", "0"]);

    let window = env
        .service
        .audit_logs(
            &AuditFilter::new()
                .user_id(7)
                .between(start + Duration::seconds(90), env.clock.now())
                .limit(1),
        )
        .await
        .unwrap();
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].status, AuditStatus::Failure);
}

//! Concurrency tests for steward.
//!
//! These tests run against a file-backed database so that several pool
//! connections race for the same rows.

mod common;

use std::collections::HashSet;
use std::sync::Arc;

use common::{setup_on_disk, ADMIN_USERNAME};
use steward::auth::lockout::MAX_LOGIN_ATTEMPTS;
use steward::{AccountError, AuditFilter, AuthError, Caller, NewUserRequest};
use tempfile::TempDir;

/// Concurrent wrong passwords count every failure once and lock exactly once.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failed_logins() {
    let dir = TempDir::new().unwrap();
    let env = setup_on_disk(dir.path()).await;

    const NUM_ATTEMPTS: usize = 12;

    let mut handles = Vec::new();
    for _ in 0..NUM_ATTEMPTS {
        let service = Arc::clone(&env.service);
        handles.push(tokio::spawn(async move {
            service
                .authenticate(ADMIN_USERNAME, "wrong-password", &Caller::anonymous())
                .await
        }));
    }

    let mut invalid = 0;
    let mut locked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Err(AuthError::InvalidCredentials) => invalid += 1,
            Err(AuthError::AccountLocked { .. }) => locked += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }
    assert_eq!(invalid + locked, NUM_ATTEMPTS);

    let account = env
        .service
        .find_by_username(ADMIN_USERNAME)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.login_attempts, MAX_LOGIN_ATTEMPTS);
    assert!(account.locked_until.is_some());

    let lock_events = env
        .service
        .audit_logs(&AuditFilter::new().action("account_locked"))
        .await
        .unwrap();
    assert_eq!(lock_events.len(), 1);
}

/// Racing creates for the same username yield exactly one account.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_creates() {
    let dir = TempDir::new().unwrap();
    let env = setup_on_disk(dir.path()).await;
    let role_id = env.role("Staff").await.id;

    const NUM_REQUESTS: usize = 8;

    let mut handles = Vec::new();
    for i in 0..NUM_REQUESTS {
        let service = Arc::clone(&env.service);
        handles.push(tokio::spawn(async move {
            service
                .create_user(
                    &Caller::anonymous(),
                    NewUserRequest::new(
                        "frank",
                        format!("frank{i}@x.com"),
                        "Frank",
                        "frank-pass-1",
                        role_id,
                    ),
                )
                .await
        }));
    }

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AccountError::DuplicateUsername) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(created, 1);

    let frank: Vec<_> = env
        .service
        .users()
        .await
        .unwrap()
        .into_iter()
        .filter(|a| a.username == "frank")
        .collect();
    assert_eq!(frank.len(), 1);
    let audited = env
        .service
        .audit_logs(&AuditFilter::new().action("create_user"))
        .await
        .unwrap();
    assert_eq!(audited.len(), 2);
}

/// Concurrent logins of different accounts each get their own session.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_logins() {
    let dir = TempDir::new().unwrap();
    let env = setup_on_disk(dir.path()).await;

    const NUM_USERS: usize = 6;
    for i in 0..NUM_USERS {
        env.create_user(&format!("user{i}"), "shared-pass-1", "Staff")
            .await;
    }

    let mut handles = Vec::new();
    for i in 0..NUM_USERS {
        let service = Arc::clone(&env.service);
        handles.push(tokio::spawn(async move {
            service
                .authenticate(&format!("user{i}"), "shared-pass-1", &Caller::anonymous())
                .await
                .unwrap()
        }));
    }

    let mut tokens = HashSet::new();
    for handle in handles {
        tokens.insert(handle.await.unwrap().token);
    }
    assert_eq!(tokens.len(), NUM_USERS);
    // create_user opens one admin session per account
    assert_eq!(
        env.service.sessions().session_count().await.unwrap(),
        (NUM_USERS * 2) as i64
    );
}

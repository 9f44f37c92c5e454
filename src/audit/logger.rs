//! Audit logger: attribution, redaction and retention.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{redact, AuditEvent, Caller};
use crate::clock::Clock;
use crate::db::{AuditFilter, AuditLogEntry, AuditRepository, Database, NewAuditLogEntry};
use crate::Result;

/// Default number of entries kept.
pub const DEFAULT_RETENTION: usize = 10_000;

/// Appends audit entries and serves filtered reads.
#[derive(Debug, Clone)]
pub struct AuditLogger {
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    retention: usize,
}

impl AuditLogger {
    pub fn new(db: Arc<Database>, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            retention: DEFAULT_RETENTION,
        }
    }

    /// Keep at most `retention` entries (at least one).
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention.max(1);
        self
    }

    pub fn retention(&self) -> usize {
        self.retention
    }

    fn repo(&self) -> AuditRepository<'_> {
        AuditRepository::new(self.db.pool())
    }

    /// Append an event attributed to `caller`.
    pub async fn log(&self, caller: &Caller, event: AuditEvent) -> Result<i64> {
        let entry = NewAuditLogEntry {
            user_id: caller.user_id,
            username: caller.display_name().to_string(),
            action: event.action,
            module: event.module,
            resource_id: event.resource_id,
            old_value: event.old_value.map(redact::redacted),
            new_value: event.new_value.map(redact::redacted),
            timestamp: self.clock.now(),
            status: event.status,
            origin: caller.origin.clone(),
            user_agent: caller.user_agent.clone(),
        };

        let id = self.repo().append(&entry, self.retention).await?;
        debug!(
            audit_id = id,
            action = %entry.action,
            module = %entry.module,
            status = %entry.status,
            "Audit entry recorded"
        );
        Ok(id)
    }

    /// Append an event attached to another operation.
    ///
    /// Failures are logged and swallowed so the primary operation's result
    /// stands.
    pub async fn record(&self, caller: &Caller, event: AuditEvent) {
        let action = event.action.clone();
        if let Err(e) = self.log(caller, event).await {
            warn!(action = %action, error = %e, "Failed to write audit entry");
        }
    }

    /// Filtered entries, newest first.
    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>> {
        self.repo().query(filter).await
    }

    /// Number of stored entries.
    pub async fn count(&self) -> Result<i64> {
        self.repo().count().await
    }
}

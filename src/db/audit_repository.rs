//! Audit log repository for steward.
//!
//! Append-only: rows are only ever inserted, or evicted oldest-first once
//! the table grows past its retention cap. IDs therefore stay contiguous,
//! which lets eviction work off the newest ID alone.

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::QueryBuilder;
use tracing::debug;

use super::audit_log::{AuditLogEntry, AuditStatus, NewAuditLogEntry};
use super::DbPool;
use crate::{Result, StewardError};

#[derive(sqlx::FromRow)]
struct AuditRow {
    id: i64,
    user_id: Option<i64>,
    username: String,
    action: String,
    module: String,
    resource_id: Option<String>,
    old_value: Option<String>,
    new_value: Option<String>,
    timestamp: DateTime<Utc>,
    status: String,
    origin: Option<String>,
    user_agent: Option<String>,
}

fn parse_value(raw: Option<String>) -> Result<Option<Value>> {
    raw.map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(StewardError::from)
}

impl TryFrom<AuditRow> for AuditLogEntry {
    type Error = StewardError;

    fn try_from(row: AuditRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            username: row.username,
            action: row.action,
            module: row.module,
            resource_id: row.resource_id,
            old_value: parse_value(row.old_value)?,
            new_value: parse_value(row.new_value)?,
            timestamp: row.timestamp,
            status: row.status.parse().map_err(StewardError::Serialization)?,
            origin: row.origin,
            user_agent: row.user_agent,
        })
    }
}

/// Filter for audit queries. Unset fields match everything; the timestamp
/// range is inclusive on both ends.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub user_id: Option<i64>,
    pub module: Option<String>,
    pub action: Option<String>,
    pub status: Option<AuditStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn status(mut self, status: AuditStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Restrict to `from <= timestamp <= to`.
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Repository for audit entries.
pub struct AuditRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> AuditRepository<'a> {
    /// Create a new AuditRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Append an entry and evict the oldest ones beyond `retention`, in one
    /// transaction. Returns the new entry's ID.
    pub async fn append(&self, entry: &NewAuditLogEntry, retention: usize) -> Result<i64> {
        let old_value = entry.old_value.as_ref().map(Value::to_string);
        let new_value = entry.new_value.as_ref().map(Value::to_string);

        let mut tx = self.pool.begin().await?;

        let id: i64 = sqlx::query_scalar(
            "INSERT INTO audit_logs (user_id, username, action, module, resource_id,
                                     old_value, new_value, timestamp, status, origin, user_agent)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(entry.user_id)
        .bind(&entry.username)
        .bind(&entry.action)
        .bind(&entry.module)
        .bind(&entry.resource_id)
        .bind(old_value)
        .bind(new_value)
        .bind(entry.timestamp)
        .bind(entry.status.as_str())
        .bind(&entry.origin)
        .bind(&entry.user_agent)
        .fetch_one(&mut *tx)
        .await?;

        let evicted = sqlx::query("DELETE FROM audit_logs WHERE id <= ?")
            .bind(id.saturating_sub(i64::try_from(retention).unwrap_or(i64::MAX)))
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        if evicted > 0 {
            debug!(evicted, "Evicted oldest audit entries");
        }
        Ok(id)
    }

    /// Query entries, newest first.
    pub async fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditLogEntry>> {
        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT id, user_id, username, action, module, resource_id, old_value, new_value,
                    timestamp, status, origin, user_agent
             FROM audit_logs WHERE 1 = 1",
        );

        if let Some(user_id) = filter.user_id {
            query.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(ref module) = filter.module {
            query.push(" AND module = ").push_bind(module);
        }
        if let Some(ref action) = filter.action {
            query.push(" AND action = ").push_bind(action);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(from) = filter.from {
            query.push(" AND timestamp >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            query.push(" AND timestamp <= ").push_bind(to);
        }

        query.push(" ORDER BY timestamp DESC, id DESC");

        if let Some(limit) = filter.limit {
            query.push(" LIMIT ").push_bind(limit);
        }

        let rows = query
            .build_query_as::<AuditRow>()
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(AuditLogEntry::try_from).collect()
    }

    /// Count stored entries.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

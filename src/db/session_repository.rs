//! Session repository for steward.
//!
//! Sessions are keyed by the SHA-256 digest of their bearer token; the raw
//! token never reaches the database.

use chrono::{DateTime, Utc};

use super::role::Permission;
use super::DbPool;
use crate::Result;

/// A persisted session row.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    /// Hex SHA-256 digest of the bearer token.
    pub token_hash: String,
    /// Owning account.
    pub account_id: i64,
    /// Username at login time.
    pub username: String,
    /// Role at login time.
    pub role_id: i64,
    /// Permission snapshot taken at login.
    pub permissions: Vec<Permission>,
    /// Whether the account had to change its password at login.
    pub must_change_password: bool,
    /// Creation time.
    pub login_time: DateTime<Utc>,
    /// Last time the session was read.
    pub last_activity: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    token_hash: String,
    account_id: i64,
    username: String,
    role_id: i64,
    permissions: String,
    must_change_password: bool,
    login_time: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = crate::StewardError;

    fn try_from(row: SessionRow) -> Result<Self> {
        Ok(Self {
            token_hash: row.token_hash,
            account_id: row.account_id,
            username: row.username,
            role_id: row.role_id,
            permissions: serde_json::from_str(&row.permissions)?,
            must_change_password: row.must_change_password,
            login_time: row.login_time,
            last_activity: row.last_activity,
        })
    }
}

/// Repository for session rows.
pub struct SessionRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> SessionRepository<'a> {
    /// Create a new SessionRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a session.
    pub async fn create(&self, record: &SessionRecord) -> Result<()> {
        let permissions = serde_json::to_string(&record.permissions)?;
        sqlx::query(
            "INSERT INTO sessions (token_hash, account_id, username, role_id, permissions,
                                   must_change_password, login_time, last_activity)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.token_hash)
        .bind(record.account_id)
        .bind(&record.username)
        .bind(record.role_id)
        .bind(permissions)
        .bind(record.must_change_password)
        .bind(record.login_time)
        .bind(record.last_activity)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Load a session by token digest.
    pub async fn get(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT token_hash, account_id, username, role_id, permissions,
                    must_change_password, login_time, last_activity
             FROM sessions WHERE token_hash = ?",
        )
        .bind(token_hash)
        .fetch_optional(self.pool)
        .await?;

        row.map(SessionRecord::try_from).transpose()
    }

    /// Refresh `last_activity`. Returns false if the session is gone.
    pub async fn touch(&self, token_hash: &str, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query("UPDATE sessions SET last_activity = ? WHERE token_hash = ?")
            .bind(now)
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Clear the forced-change flag on every session of an account.
    pub async fn clear_must_change(&self, account_id: i64) -> Result<()> {
        sqlx::query("UPDATE sessions SET must_change_password = 0 WHERE account_id = ?")
            .bind(account_id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Delete a session. Returns true if it existed.
    pub async fn delete(&self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(token_hash)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete every session of an account, optionally keeping one.
    pub async fn delete_for_account(&self, account_id: i64, keep: Option<&str>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM sessions WHERE account_id = ? AND token_hash != COALESCE(?, '')")
                .bind(account_id)
                .bind(keep)
                .execute(self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    /// Delete sessions whose last activity is strictly before `cutoff`.
    pub async fn delete_idle_before(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE last_activity < ?")
            .bind(cutoff)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Count sessions of an account.
    pub async fn count_for_account(&self, account_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions WHERE account_id = ?")
            .bind(account_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count all sessions.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

//! Account repository for steward.
//!
//! Plain CRUD over the `users` table. Read-modify-write sequences that must
//! be atomic (uniqueness check then insert, lockout counter updates) are
//! serialized by the caller; see `auth::accounts`.

use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;

use super::account::{Account, AccountUpdate, NewAccount};
use super::DbPool;
use crate::{Result, StewardError};

const ACCOUNT_COLUMNS: &str = "id, username, email, full_name, role_id, is_active, password_hash,
     login_attempts, locked_until, must_change_password, last_login,
     created_at, updated_at, created_by";

/// Map a write error, naming the unique column that was violated.
fn write_error(e: sqlx::Error) -> StewardError {
    if let sqlx::Error::Database(ref db) = e {
        if db.is_unique_violation() {
            let field = if db.message().contains("users.email") {
                "email"
            } else {
                "username"
            };
            return StewardError::Conflict(field.to_string());
        }
    }
    StewardError::Database(e.to_string())
}

/// Repository for account CRUD operations.
pub struct AccountRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> AccountRepository<'a> {
    /// Create a new AccountRepository with the given pool reference.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new account.
    ///
    /// A single INSERT, so either the whole record is persisted or nothing
    /// is. Duplicate username/email yields `StewardError::Conflict`.
    pub async fn create(&self, new_account: &NewAccount, now: DateTime<Utc>) -> Result<Account> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, email, full_name, role_id, password_hash,
                                must_change_password, created_at, updated_at, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&new_account.username)
        .bind(&new_account.email)
        .bind(&new_account.full_name)
        .bind(new_account.role_id)
        .bind(&new_account.password_hash)
        .bind(new_account.must_change_password)
        .bind(now)
        .bind(now)
        .bind(&new_account.created_by)
        .fetch_one(self.pool)
        .await
        .map_err(write_error)?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| StewardError::NotFound("account".to_string()))
    }

    /// Get an account by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = ?");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(account)
    }

    /// Get an account by username (case-insensitive).
    pub async fn get_by_username(&self, username: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE username = ? COLLATE NOCASE");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(username)
            .fetch_optional(self.pool)
            .await?;
        Ok(account)
    }

    /// Get an account by email (case-insensitive).
    pub async fn get_by_email(&self, email: &str) -> Result<Option<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE");
        let account = sqlx::query_as::<_, Account>(&sql)
            .bind(email)
            .fetch_optional(self.pool)
            .await?;
        Ok(account)
    }

    /// List all accounts, including inactive ones.
    pub async fn list_all(&self) -> Result<Vec<Account>> {
        let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users ORDER BY username");
        let accounts = sqlx::query_as::<_, Account>(&sql)
            .fetch_all(self.pool)
            .await?;
        Ok(accounts)
    }

    /// Check if a username is already taken (case-insensitive).
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE username = ? COLLATE NOCASE)")
                .bind(username)
                .fetch_one(self.pool)
                .await?;
        Ok(exists)
    }

    /// Check if an email is already used by an account other than `except_id`.
    pub async fn email_exists(&self, email: &str, except_id: Option<i64>) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ? COLLATE NOCASE AND id != ?)",
        )
        .bind(email)
        .bind(except_id.unwrap_or(-1))
        .fetch_one(self.pool)
        .await?;
        Ok(exists)
    }

    /// Update an account by ID.
    ///
    /// Only fields set in the update are modified. Returns the updated
    /// account, or None if not found.
    pub async fn update(
        &self,
        id: i64,
        update: &AccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Account>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut query: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut separated = query.separated(", ");

        if let Some(ref full_name) = update.full_name {
            separated.push("full_name = ");
            separated.push_bind_unseparated(full_name);
        }
        if let Some(ref email) = update.email {
            separated.push("email = ");
            separated.push_bind_unseparated(email);
        }
        if let Some(role_id) = update.role_id {
            separated.push("role_id = ");
            separated.push_bind_unseparated(role_id);
        }
        if let Some(is_active) = update.is_active {
            separated.push("is_active = ");
            separated.push_bind_unseparated(is_active);
        }
        if let Some(ref hash) = update.password_hash {
            separated.push("password_hash = ");
            separated.push_bind_unseparated(hash);
        }
        if let Some(must_change) = update.must_change_password {
            separated.push("must_change_password = ");
            separated.push_bind_unseparated(must_change);
        }
        if update.clear_lockout {
            separated.push("login_attempts = 0");
            separated.push("locked_until = NULL");
        }
        separated.push("updated_at = ");
        separated.push_bind_unseparated(now);

        query.push(" WHERE id = ");
        query.push_bind(id);

        let result = query
            .build()
            .execute(self.pool)
            .await
            .map_err(write_error)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.get_by_id(id).await
    }

    /// Persist lockout counter state after a failed login.
    pub async fn set_lock_state(
        &self,
        id: i64,
        login_attempts: u32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET login_attempts = ?, locked_until = ? WHERE id = ?")
            .bind(login_attempts)
            .bind(locked_until)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Reset lockout state and stamp the last login after a successful login.
    pub async fn record_login(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "UPDATE users SET login_attempts = 0, locked_until = NULL, last_login = ? WHERE id = ?",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Count accounts assigned to a role.
    pub async fn count_by_role(&self, role_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role_id = ?")
            .bind(role_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Count all accounts.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

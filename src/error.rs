//! Error types for steward.

use thiserror::Error;

/// Common error type for steward.
///
/// `Database` is the storage failure surfaced by every store operation; it is
/// never swallowed by the stores themselves.
#[derive(Error, Debug)]
pub enum StewardError {
    /// Database error.
    ///
    /// Wraps errors from the storage backend. Errors from sqlx are
    /// automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A uniqueness constraint rejected the write; carries the column name.
    #[error("{0} already exists")]
    Conflict(String),

    /// Stored data could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for StewardError {
    fn from(e: sqlx::Error) -> Self {
        StewardError::Database(e.to_string())
    }
}

impl StewardError {
    /// Convert a sqlx error, mapping unique-constraint violations to
    /// `Conflict(field)`.
    pub(crate) fn from_write(e: sqlx::Error, field: &str) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StewardError::Conflict(field.to_string())
            }
            _ => StewardError::Database(e.to_string()),
        }
    }
}

impl From<serde_json::Error> for StewardError {
    fn from(e: serde_json::Error) -> Self {
        StewardError::Serialization(e.to_string())
    }
}

/// Result type alias for steward operations.
pub type Result<T> = std::result::Result<T, StewardError>;

//! Configuration module for steward.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, StewardError};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/steward.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/steward.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Security policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// Consecutive failed logins before the account is locked.
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u32,
    /// How long a locked account rejects logins, in seconds.
    #[serde(default = "default_lockout_duration")]
    pub lockout_duration_secs: u64,
    /// Session idle timeout in seconds.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Maximum number of audit entries kept.
    #[serde(default = "default_audit_retention")]
    pub audit_retention: usize,
    /// Revoke an account's other sessions when it logs in again.
    #[serde(default)]
    pub exclusive_sessions: bool,
    /// Interval of the background session sweep (0 disables it).
    #[serde(default)]
    pub session_sweep_interval_secs: u64,
    /// Argon2 memory cost in KiB.
    #[serde(default = "default_hash_memory")]
    pub hash_memory_kib: u32,
    /// Argon2 time cost (iterations).
    #[serde(default = "default_hash_iterations")]
    pub hash_iterations: u32,
    /// Argon2 parallelism.
    #[serde(default = "default_hash_parallelism")]
    pub hash_parallelism: u32,
    /// Maximum number of concurrent hashing jobs.
    #[serde(default = "default_hash_workers")]
    pub hash_workers: usize,
}

fn default_max_login_attempts() -> u32 {
    5
}

fn default_lockout_duration() -> u64 {
    30 * 60
}

fn default_idle_timeout() -> u64 {
    8 * 60 * 60
}

fn default_audit_retention() -> usize {
    10_000
}

fn default_hash_memory() -> u32 {
    65536
}

fn default_hash_iterations() -> u32 {
    3
}

fn default_hash_parallelism() -> u32 {
    4
}

fn default_hash_workers() -> usize {
    4
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_login_attempts: default_max_login_attempts(),
            lockout_duration_secs: default_lockout_duration(),
            idle_timeout_secs: default_idle_timeout(),
            audit_retention: default_audit_retention(),
            exclusive_sessions: false,
            session_sweep_interval_secs: 0,
            hash_memory_kib: default_hash_memory(),
            hash_iterations: default_hash_iterations(),
            hash_parallelism: default_hash_parallelism(),
            hash_workers: default_hash_workers(),
        }
    }
}

/// First-run administrator account.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Username of the default administrator.
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    /// Email of the default administrator.
    #[serde(default = "default_admin_email")]
    pub admin_email: String,
    /// Display name of the default administrator.
    #[serde(default = "default_admin_full_name")]
    pub admin_full_name: String,
    /// Initial password; must be changed at first login.
    #[serde(default = "default_admin_password")]
    pub admin_password: String,
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_admin_email() -> String {
    "admin@example.com".to_string()
}

fn default_admin_full_name() -> String {
    "System Administrator".to_string()
}

fn default_admin_password() -> String {
    "admin123".to_string()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            admin_username: default_admin_username(),
            admin_email: default_admin_email(),
            admin_full_name: default_admin_full_name(),
            admin_password: default_admin_password(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Security policy.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Default administrator.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(StewardError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| StewardError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `STEWARD_ADMIN_PASSWORD`: Override the bootstrap administrator password
    pub fn apply_env_overrides(&mut self) {
        if let Ok(password) = std::env::var("STEWARD_ADMIN_PASSWORD") {
            if !password.is_empty() {
                self.bootstrap.admin_password = password;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let security = &self.security;
        if security.max_login_attempts == 0 {
            return Err(StewardError::Config(
                "max_login_attempts must be at least 1".to_string(),
            ));
        }
        if security.idle_timeout_secs == 0 {
            return Err(StewardError::Config(
                "idle_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if security.audit_retention == 0 {
            return Err(StewardError::Config(
                "audit_retention must be greater than 0".to_string(),
            ));
        }
        if security.hash_workers == 0 {
            return Err(StewardError::Config(
                "hash_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

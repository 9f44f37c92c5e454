//! Database schema and migrations for steward.
//!
//! Migrations are applied sequentially when the database is first opened or
//! upgraded. Timestamps are RFC 3339 UTC strings produced by the service
//! clock, never by SQLite's `datetime('now')`.

/// Database migrations.
///
/// Each migration is a SQL script executed in order; the `schema_version`
/// table tracks which ones have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: permission catalog, roles, accounts
    r#"
CREATE TABLE permissions (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    module      TEXT NOT NULL,
    action      TEXT NOT NULL,
    resource    TEXT,
    description TEXT NOT NULL DEFAULT ''
);

-- NULL resources would compare distinct in a plain UNIQUE constraint
CREATE UNIQUE INDEX idx_permissions_triple
    ON permissions(module, action, COALESCE(resource, ''));

CREATE TABLE roles (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE COLLATE NOCASE,
    description TEXT NOT NULL DEFAULT '',
    is_system   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE role_permissions (
    role_id       INTEGER NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    permission_id INTEGER NOT NULL REFERENCES permissions(id),
    PRIMARY KEY (role_id, permission_id)
);

CREATE TABLE users (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    username             TEXT NOT NULL UNIQUE COLLATE NOCASE,
    email                TEXT NOT NULL UNIQUE COLLATE NOCASE,
    full_name            TEXT NOT NULL,
    role_id              INTEGER NOT NULL REFERENCES roles(id),
    is_active            INTEGER NOT NULL DEFAULT 1,
    password_hash        TEXT NOT NULL,           -- Argon2 PHC string
    login_attempts       INTEGER NOT NULL DEFAULT 0 CHECK (login_attempts >= 0),
    locked_until         TEXT,
    must_change_password INTEGER NOT NULL DEFAULT 0,
    last_login           TEXT,
    created_at           TEXT NOT NULL,
    updated_at           TEXT NOT NULL,
    created_by           TEXT NOT NULL
);

CREATE INDEX idx_users_role_id ON users(role_id);
"#,
    // v2: sessions keyed by token digest
    r#"
CREATE TABLE sessions (
    token_hash           TEXT PRIMARY KEY,        -- SHA-256 of the bearer token
    account_id           INTEGER NOT NULL REFERENCES users(id),
    username             TEXT NOT NULL,
    role_id              INTEGER NOT NULL,
    permissions          TEXT NOT NULL,           -- JSON snapshot taken at login
    must_change_password INTEGER NOT NULL DEFAULT 0,
    login_time           TEXT NOT NULL,
    last_activity        TEXT NOT NULL
);

CREATE INDEX idx_sessions_account_id ON sessions(account_id);
CREATE INDEX idx_sessions_last_activity ON sessions(last_activity);
"#,
    // v3: append-only audit log
    r#"
CREATE TABLE audit_logs (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER,                          -- no FK: entries outlive accounts
    username    TEXT NOT NULL,
    action      TEXT NOT NULL,
    module      TEXT NOT NULL,
    resource_id TEXT,
    old_value   TEXT,
    new_value   TEXT,
    timestamp   TEXT NOT NULL,
    status      TEXT NOT NULL,                    -- 'success', 'failure', 'warning'
    origin      TEXT,
    user_agent  TEXT
);

CREATE INDEX idx_audit_logs_timestamp ON audit_logs(timestamp);
CREATE INDEX idx_audit_logs_user_id ON audit_logs(user_id);
CREATE INDEX idx_audit_logs_module_action ON audit_logs(module, action);
"#,
];

//! Credential redaction for audit snapshots.

use serde_json::Value;

/// Replacement written in place of a credential value.
pub const REDACTED: &str = "[REDACTED]";

/// Keys whose values are never stored in the audit log.
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "password_hash",
    "new_password",
    "current_password",
    "old_password",
    "temporary_password",
    "token",
    "token_hash",
    "secret",
];

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.contains(&key.as_str())
}

/// Replace credential values anywhere in `value`, recursing into nested
/// objects and arrays.
pub fn redact(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, v) in map.iter_mut() {
                if is_sensitive(key) {
                    *v = Value::String(REDACTED.to_string());
                } else {
                    redact(v);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(redact),
        _ => {}
    }
}

/// Owned variant of [`redact`].
pub fn redacted(mut value: Value) -> Value {
    redact(&mut value);
    value
}

//! Redaction and truncation helpers shared by the notifier.

use serde_json::Value;
use url::Url;

/// Maximum number of bytes of a response body written to debug logs.
pub const MAX_BODY_LENGTH: usize = 4000;

/// Replacement for redacted values.
pub const REDACTED: &str = "***";

const SENSITIVE_FRAGMENTS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "token",
    "secret",
    "api_key",
    "apikey",
    "credentials",
];

const SENSITIVE_EXACT: &[&str] = &["key", "sign", "signature"];

/// Truncate a string to at most `max_len` bytes, snapping to a char
/// boundary so multi-byte characters are never split.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

/// Whether a field or query parameter name usually holds a credential.
pub fn is_sensitive_key(key: &str) -> bool {
    let key_lower = key.to_lowercase();
    SENSITIVE_FRAGMENTS.iter().any(|f| key_lower.contains(f))
        || SENSITIVE_EXACT.contains(&key_lower.as_str())
}

/// Copy of `url` with the password and every sensitive query value
/// replaced by [`REDACTED`]. Parameter order is kept.
pub fn redact_url(url: &Url) -> Url {
    let mut redacted = url.clone();
    if redacted.password().is_some() {
        let _ = redacted.set_password(Some(REDACTED));
    }
    if url.query().is_some() {
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| {
                let v = if is_sensitive_key(&k) {
                    REDACTED.to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), v)
            })
            .collect();
        redacted.query_pairs_mut().clear().extend_pairs(pairs);
    }
    redacted
}

/// Replace raw and form-encoded occurrences of `secret` in `text`.
pub fn scrub_secret(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    let encoded: String = url::form_urlencoded::byte_serialize(secret.as_bytes()).collect();
    let scrubbed = text.replace(secret, REDACTED);
    if encoded == secret {
        scrubbed
    } else {
        scrubbed.replace(&encoded, REDACTED)
    }
}

/// Redact sensitive fields from a JSON value, recursing into objects and
/// arrays.
pub fn redact_sensitive_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut redacted = serde_json::Map::new();
            for (key, val) in map {
                if is_sensitive_key(key) {
                    redacted.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else if val.is_object() || val.is_array() {
                    redacted.insert(key.clone(), redact_sensitive_json(val));
                } else {
                    redacted.insert(key.clone(), val.clone());
                }
            }
            Value::Object(redacted)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(redact_sensitive_json).collect()),
        _ => value.clone(),
    }
}

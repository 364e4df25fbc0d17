//! API request signing with a shared secret
//!
//! Mutating requests carry `timestamp` (Unix epoch ms) and `hash` fields in
//! their JSON body. Reads send the same two fields as query parameters. The hash is the SHA-256 of the canonical JSON body (with
//! `hash` replaced by 64 zeros) followed by the shared secret as a decimal
//! string. The secret lives in the `settings` table; a value of 0 disables
//! checking.
//!
//! Only pure functions and database access live here; the axum middleware
//! is in hedwig-web.

use serde_json::Value;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

const SECRET_KEY: &str = "api_shared_secret";
const PLACEHOLDER_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Maximum age of a request timestamp
pub const MAX_PAST_MS: i64 = 1000;
/// Maximum clock skew into the future
pub const MAX_FUTURE_MS: i64 = 1;

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("Invalid timestamp: {reason}")]
    InvalidTimestamp { timestamp: i64, now: i64, reason: String },

    #[error("Invalid hash")]
    InvalidHash { provided: String, calculated: String },

    #[error("Database error: {0}")]
    Database(String),
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Load the shared secret, generating one on first use
pub async fn load_shared_secret(db: &SqlitePool) -> Result<i64, AuthError> {
    let stored: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(SECRET_KEY)
        .fetch_optional(db)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

    match stored {
        Some(value) => value
            .parse::<i64>()
            .map_err(|e| AuthError::Database(format!("Invalid shared secret: {}", e))),
        None => initialize_shared_secret(db).await,
    }
}

/// Generate and store a fresh non-zero secret
pub async fn initialize_shared_secret(db: &SqlitePool) -> Result<i64, AuthError> {
    use rand::Rng;

    let mut rng = rand::thread_rng();
    let secret = loop {
        let candidate: i64 = rng.gen();
        if candidate != 0 {
            break candidate;
        }
    };

    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(SECRET_KEY)
        .bind(secret.to_string())
        .execute(db)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

    Ok(secret)
}

pub fn validate_timestamp(timestamp: i64) -> Result<(), AuthError> {
    validate_timestamp_at(timestamp, now_ms())
}

fn validate_timestamp_at(timestamp: i64, now: i64) -> Result<(), AuthError> {
    let age = now - timestamp;

    if age > MAX_PAST_MS {
        return Err(AuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("{}ms old (max {}ms)", age, MAX_PAST_MS),
        });
    }

    if age < -MAX_FUTURE_MS {
        return Err(AuthError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!("{}ms in the future (max {}ms)", -age, MAX_FUTURE_MS),
        });
    }

    Ok(())
}

pub fn calculate_hash(body: &Value, shared_secret: i64) -> String {
    let mut value = body.clone();
    if let Some(obj) = value.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(PLACEHOLDER_HASH.to_string()));
    }

    let mut hasher = Sha256::new();
    hasher.update(to_canonical_json(&value).as_bytes());
    hasher.update(shared_secret.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn validate_hash(provided: &str, body: &Value, shared_secret: i64) -> Result<(), AuthError> {
    let calculated = calculate_hash(body, shared_secret);
    if provided != calculated {
        return Err(AuthError::InvalidHash {
            provided: provided.to_string(),
            calculated,
        });
    }
    Ok(())
}

/// Add `timestamp` and `hash` to a request body (client side of the scheme)
pub fn sign_body(body: &mut Value, shared_secret: i64) {
    if let Some(obj) = body.as_object_mut() {
        obj.insert("timestamp".to_string(), Value::from(now_ms()));
    }
    let hash = calculate_hash(body, shared_secret);
    if let Some(obj) = body.as_object_mut() {
        obj.insert("hash".to_string(), Value::String(hash));
    }
}

/// Query string signing a read: `timestamp=..&hash=..`
pub fn sign_query(shared_secret: i64) -> String {
    let mut body = serde_json::json!({});
    sign_body(&mut body, shared_secret);
    format!("timestamp={}&hash={}", body["timestamp"], body["hash"].as_str().unwrap_or(""))
}

/// Sorted keys, no whitespace
pub fn to_canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let items: Vec<String> = keys
                .into_iter()
                .map(|k| format!("{}:{}", Value::String(k.clone()), to_canonical_json(&map[k])))
                .collect();
            format!("{{{}}}", items.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(to_canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_timestamp_window() {
        let now = 1_800_000_000_000;
        assert!(validate_timestamp_at(now, now).is_ok());
        assert!(validate_timestamp_at(now - MAX_PAST_MS, now).is_ok());
        assert!(validate_timestamp_at(now - MAX_PAST_MS - 1, now).is_err());
        assert!(validate_timestamp_at(now + 1, now).is_ok());
        assert!(validate_timestamp_at(now + 2, now).is_err());
    }

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let value = json!({"z": [{"b": 1, "a": "x"}], "a": null});
        assert_eq!(to_canonical_json(&value), r#"{"a":null,"z":[{"a":"x","b":1}]}"#);
    }

    #[test]
    fn test_hash_ignores_existing_hash_field() {
        let a = json!({"records": [], "timestamp": 5, "hash": "abc"});
        let b = json!({"records": [], "timestamp": 5, "hash": "def"});
        assert_eq!(calculate_hash(&a, 42), calculate_hash(&b, 42));
        assert_ne!(calculate_hash(&a, 42), calculate_hash(&a, 43));
    }

    #[test]
    fn test_signed_body_validates() {
        let mut body = json!({"records": [{"id": 1, "name": "Aff A"}]});
        sign_body(&mut body, 987654321);

        let hash = body["hash"].as_str().unwrap().to_string();
        assert!(validate_hash(&hash, &body, 987654321).is_ok());
        assert!(validate_hash(&hash, &body, 1).is_err());
        assert!(validate_timestamp(body["timestamp"].as_i64().unwrap()).is_ok());
    }

    #[test]
    fn test_signed_query_matches_two_field_body() {
        let query = sign_query(555);
        let (timestamp, hash) = query.split_once('&').unwrap();
        let timestamp: i64 = timestamp.strip_prefix("timestamp=").unwrap().parse().unwrap();
        let hash = hash.strip_prefix("hash=").unwrap();

        let signed = json!({"timestamp": timestamp, "hash": hash});
        assert!(validate_hash(hash, &signed, 555).is_ok());
        assert!(validate_hash(hash, &signed, 556).is_err());
    }
}

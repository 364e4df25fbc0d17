//! Request signature middleware
//!
//! PUT requests carry `timestamp` and `hash` fields in their JSON body.
//! GET requests carry them as query parameters, signed over a body made of
//! just those two fields.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use hedwig_common::auth::{validate_hash, validate_timestamp, AuthError as SignatureError};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::AppState;

/// Largest request body accepted for signature checking
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Deserialize)]
struct AuthFields {
    timestamp: i64,
    hash: String,
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    if *request.method() == Method::GET {
        validate_query(&request, state.shared_secret)?;
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| AuthError::ParseError(format!("Failed to read body: {}", e)))?;

    let json_value: Value = serde_json::from_slice(&body_bytes)
        .map_err(|e| AuthError::ParseError(format!("Invalid JSON: {}", e)))?;

    let fields: AuthFields = serde_json::from_value(json_value.clone())
        .map_err(|e| AuthError::MissingFields(e.to_string()))?;

    check_signature(&fields, &json_value, state.shared_secret, &parts.uri)?;

    let request = Request::from_parts(parts, Body::from(body_bytes));

    Ok(next.run(request).await)
}

/// Reads have no body, so the signed value is `{"hash": .., "timestamp": ..}`
/// taken from the query string.
fn validate_query(request: &Request, shared_secret: i64) -> Result<(), AuthError> {
    let mut timestamp = None;
    let mut hash = None;

    for pair in request.uri().query().unwrap_or("").split('&') {
        match pair.split_once('=') {
            Some(("timestamp", value)) => timestamp = value.parse::<i64>().ok(),
            Some(("hash", value)) => hash = Some(value.to_string()),
            _ => {}
        }
    }

    let (Some(timestamp), Some(hash)) = (timestamp, hash) else {
        return Err(AuthError::Unsigned);
    };

    let signed = json!({ "timestamp": timestamp, "hash": &hash });
    check_signature(&AuthFields { timestamp, hash }, &signed, shared_secret, request.uri())
}

fn check_signature(
    fields: &AuthFields,
    signed: &Value,
    shared_secret: i64,
    uri: &Uri,
) -> Result<(), AuthError> {
    validate_timestamp(fields.timestamp).map_err(|e| match e {
        SignatureError::InvalidTimestamp { reason, .. } => AuthError::InvalidTimestamp(reason),
        other => AuthError::Other(other.to_string()),
    })?;

    validate_hash(&fields.hash, signed, shared_secret).map_err(|e| match e {
        SignatureError::InvalidHash { provided, calculated } => {
            warn!(
                "Hash validation failed for {}: provided={}, calculated={}",
                uri, provided, calculated
            );
            AuthError::InvalidHash
        }
        other => AuthError::Other(other.to_string()),
    })
}

#[derive(Debug)]
pub enum AuthError {
    InvalidTimestamp(String),
    InvalidHash,
    Unsigned,
    MissingFields(String),
    ParseError(String),
    Other(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::InvalidTimestamp(reason) => {
                (StatusCode::UNAUTHORIZED, format!("Invalid timestamp: {}", reason))
            }
            AuthError::InvalidHash => (StatusCode::UNAUTHORIZED, "Invalid hash".to_string()),
            AuthError::Unsigned => (
                StatusCode::UNAUTHORIZED,
                "Query parameters 'timestamp' and 'hash' are required".to_string(),
            ),
            AuthError::MissingFields(msg) => {
                (StatusCode::BAD_REQUEST, format!("Missing signature fields: {}", msg))
            }
            AuthError::ParseError(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::Other(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

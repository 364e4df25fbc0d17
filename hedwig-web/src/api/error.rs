//! Mapping of storage errors to HTTP responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hedwig_common::Error as StorageError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        let ApiError::Storage(e) = self;
        match e {
            StorageError::User(_) => (StatusCode::BAD_REQUEST, "USER_ERROR"),
            StorageError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
            StorageError::NoSuchRecord(_) => (StatusCode::NOT_FOUND, "NO_SUCH_RECORD"),
            StorageError::Consistency(_) => (StatusCode::CONFLICT, "CONSISTENCY_ERROR"),
            StorageError::DatabaseIntegrity(_) => (StatusCode::CONFLICT, "INTEGRITY_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (status, Json(json!({ "error": code, "message": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_is_bad_request() {
        let err = ApiError::from(StorageError::user("Entries can not be deleted here."));
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_consistency_error_is_conflict() {
        let err = ApiError::from(StorageError::consistency("proposal does not exist with id=3"));
        assert_eq!(err.status_and_code(), (StatusCode::CONFLICT, "CONSISTENCY_ERROR"));
    }

    #[test]
    fn test_no_such_record_is_not_found() {
        let err = ApiError::from(StorageError::NoSuchRecord("call with id=9".to_string()));
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }
}

//! Common error types for Hedwig

use thiserror::Error;

/// Common result type for Hedwig operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across Hedwig crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// Constraint violation reported by the database
    #[error("Database integrity error: {0}")]
    DatabaseIntegrity(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored data (or a request against it) is inconsistent
    #[error("Consistency error: {0}")]
    Consistency(String),

    /// Problem with user input; the message is suitable for display
    #[error("{0}")]
    User(String),

    /// A single record was expected but none matched
    #[error("No such record: {0}")]
    NoSuchRecord(String),

    /// A single record was expected but several matched
    #[error("Multiple records: {0}")]
    MultipleRecords(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    pub fn user(message: impl Into<String>) -> Self {
        Error::User(message.into())
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Error::Consistency(message.into())
    }

    /// True for errors whose message may be shown to the person who
    /// submitted the request.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::User(_) | Error::InvalidInput(_))
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation()
                || db_err.is_foreign_key_violation()
                || db_err.is_check_violation()
            {
                return Error::DatabaseIntegrity(db_err.message().to_string());
            }
        }

        Error::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_error_displays_bare_message() {
        let err = Error::user("There is no PI specified.");
        assert_eq!(err.to_string(), "There is no PI specified.");
        assert!(err.is_user_facing());
    }

    #[test]
    fn test_consistency_error_not_user_facing() {
        let err = Error::consistency("proposal does not exist with id=4");
        assert!(!err.is_user_facing());
        assert!(err.to_string().contains("id=4"));
    }
}

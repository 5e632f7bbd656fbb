use rusqlite::ErrorCode;
use serde::Serialize;
use thiserror::Error;

use symbolhub_shared::ValidationError;

/// Stable, machine-checkable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRequest,
    NotFound,
    Conflict,
    StorageFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::StorageFailure => "storage_failure",
        }
    }
}

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Input rejected before any statement ran.
    #[error("Invalid request: {0}")]
    Invalid(#[from] ValidationError),

    /// A query expected exactly one row but found none.
    #[error("{0} not found")]
    NotFound(&'static str),

    /// A unique constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(rusqlite::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// JSON encoding of bound id lists.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Password hashing failed.
    #[error("Credential hashing error: {0}")]
    Credential(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Invalid(_) => ErrorKind::InvalidRequest,
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict(_) => ErrorKind::Conflict,
            StoreError::Sqlite(_)
            | StoreError::Migration(_)
            | StoreError::Json(_)
            | StoreError::Credential(_) => ErrorKind::StorageFailure,
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        if is_unique_violation(&e) {
            StoreError::Conflict(e.to_string())
        } else {
            StoreError::Sqlite(e)
        }
    }
}

/// `SQLITE_CONSTRAINT_UNIQUE` or `SQLITE_CONSTRAINT_PRIMARYKEY`.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.code == ErrorCode::ConstraintViolation
                && matches!(err.extended_code, 2067 | 1555)
        }
        _ => false,
    }
}

/// Map "no rows" onto a typed not-found for `what`.
pub(crate) fn not_found(what: &'static str) -> impl FnOnce(rusqlite::Error) -> StoreError {
    move |e| match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound(what),
        other => StoreError::from(other),
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            StoreError::NotFound("post").kind().as_str(),
            "not_found"
        );
        assert_eq!(
            StoreError::from(ValidationError::NoQueryText).kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            StoreError::Migration("boom".into()).kind(),
            ErrorKind::StorageFailure
        );
    }

    #[test]
    fn no_rows_maps_to_not_found() {
        let err = not_found("post")(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::NotFound("post")));
    }
}

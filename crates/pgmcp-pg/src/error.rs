//! Error types for the Postgres adapter.

use std::time::Duration;

use thiserror::Error;

/// Catalog introspection failure.
#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("schema introspection timed out after {0:?}")]
    Timeout(Duration),

    #[error("schema introspection failed: {0}")]
    Db(#[from] sqlx::Error),
}

/// Query execution failure.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("query timed out")]
    Timeout,

    #[error("query failed: {0}")]
    Db(#[from] sqlx::Error),
}

/// Free-text search failure.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no searchable columns")]
    NoTextColumns,

    #[error("column enumeration timed out")]
    Timeout,

    #[error("column enumeration failed: {0}")]
    Db(#[from] sqlx::Error),
}

/// Classification of a query failure, used to decide whether a faulty model
/// output is converted into a structured result instead of a hard error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFailure {
    ColumnNotFound,
    RelationNotFound,
    SyntaxError,
    Other,
}

impl QueryFailure {
    /// Classify an execution error, preferring Postgres SQLSTATE codes and
    /// falling back to message text for non-database failures.
    pub fn classify(err: &ExecError) -> Self {
        let ExecError::Db(db_err) = err else {
            return Self::Other;
        };

        if let sqlx::Error::Database(e) = db_err {
            match e.code().as_deref() {
                Some("42703") => return Self::ColumnNotFound,
                Some("42P01") => return Self::RelationNotFound,
                Some("42601") => return Self::SyntaxError,
                Some(_) => return Self::Other,
                None => {}
            }
        }

        let msg = db_err.to_string();
        if msg.contains("column") && msg.contains("does not exist") {
            Self::ColumnNotFound
        } else if msg.contains("relation") && msg.contains("does not exist") {
            Self::RelationNotFound
        } else if msg.contains("syntax error") {
            Self::SyntaxError
        } else {
            Self::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_falls_back_to_message_text() {
        let err = ExecError::Db(sqlx::Error::Protocol(
            "column \"user_id\" does not exist".to_string(),
        ));
        assert_eq!(QueryFailure::classify(&err), QueryFailure::ColumnNotFound);

        let err = ExecError::Db(sqlx::Error::Protocol(
            "relation \"orders\" does not exist".to_string(),
        ));
        assert_eq!(QueryFailure::classify(&err), QueryFailure::RelationNotFound);

        let err = ExecError::Db(sqlx::Error::Protocol(
            "syntax error at or near \"FORM\"".to_string(),
        ));
        assert_eq!(QueryFailure::classify(&err), QueryFailure::SyntaxError);
    }

    #[test]
    fn test_timeout_is_not_reclassified() {
        assert_eq!(QueryFailure::classify(&ExecError::Timeout), QueryFailure::Other);
    }
}

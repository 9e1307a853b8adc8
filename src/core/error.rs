/// Querylog Error Module
///
/// This module defines the error type shared by every query step. Errors
/// produced while a `QueryContext` runs are not returned to the caller
/// directly; they are pushed onto the context's `ErrorChain` and surfaced
/// on request.
use thiserror::Error;

/// Error type for the querylog crate.
///
/// The variants fall into three groups:
/// - driver failures (`Database`, `Scan`)
/// - logical-use failures (`Usage`, `Cursor`, `Transaction`)
/// - the placeholder `Nil`, standing in for a push that carried no error
#[derive(Error, Debug)]
pub enum QueryError {
    /// Errors reported by SQLite through rusqlite
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A row could not be decoded into the requested Rust types
    #[error("Scan error: column {column}: {message}")]
    Scan { column: usize, message: String },

    /// Cursor misuse (scan without a current row, etc.)
    #[error("Cursor error: {0}")]
    Cursor(String),

    /// Steps called out of order, e.g. executing before preparing
    #[error("Usage error: {0}")]
    Usage(String),

    /// Transaction lifecycle errors
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Terminal error returned once a context's diagnostics were flushed
    #[error("Query failed: {0}")]
    Failed(String),

    /// Placeholder cause for a push that carried no concrete error
    #[error("(nil error)")]
    Nil,
}

/// Type alias for Result to use QueryError as the error type.
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let db_err = QueryError::Database(rusqlite::Error::ExecuteReturnedResults);
        assert!(db_err.to_string().contains("Database error"));

        let scan_err = QueryError::Scan {
            column: 2,
            message: "Invalid type".to_string(),
        };
        assert_eq!(scan_err.to_string(), "Scan error: column 2: Invalid type");

        assert_eq!(QueryError::Nil.to_string(), "(nil error)");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let query_err: QueryError = io_err.into();
        match query_err {
            QueryError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }

        let toml_err = toml::from_str::<toml::Value>("[broken").unwrap_err();
        let query_err: QueryError = toml_err.into();
        match query_err {
            QueryError::Toml(_) => {}
            _ => panic!("Expected TOML error"),
        }
    }
}

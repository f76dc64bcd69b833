//! Backend error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in a persistence backend
#[derive(Error, Debug)]
pub enum StoreError {
    /// Invalid or incomplete backend configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// An existing chunk file is not a well-formed table
    #[error("Parse error in {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid numeric coercion (non-numeric cell where a float is expected)
    #[error("Value error: {0}")]
    Value(String),

    /// Remote service request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for backend operations
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Config("unknown backend type 'sqlite'".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown backend type 'sqlite'");

        let err = StoreError::Parse {
            path: PathBuf::from("/data/20240115_000000.csv"),
            message: "index column 'time' not found".to_string(),
        };
        assert!(err.to_string().contains("20240115_000000.csv"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let store_err: StoreError = io_err.into();
        assert!(matches!(store_err, StoreError::Io(_)));
    }
}

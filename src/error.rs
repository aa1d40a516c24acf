//! Error types for tablecache.

use std::io;
use thiserror::Error;

/// Result type alias for tablecache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for table cache operations.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// I/O error from file operations.
    #[error("I/O error: {0}")]
    Io(String),

    /// Data corruption detected.
    #[error("Corruption detected: {0}")]
    Corruption(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid file format or magic number.
    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    /// Iterator error.
    #[error("Iterator error: {0}")]
    IteratorError(String),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl Error {
    /// Create an I/O error with the given message.
    pub fn io<S: Into<String>>(msg: S) -> Self {
        Error::Io(msg.into())
    }

    /// Create a corruption error with the given message.
    pub fn corruption<S: Into<String>>(msg: S) -> Self {
        Error::Corruption(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Error::NotFound(msg.into())
    }

    /// Create an invalid format error.
    pub fn invalid_format<S: Into<String>>(msg: S) -> Self {
        Error::InvalidFormat(msg.into())
    }

    /// Create an internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Error::Internal(msg.into())
    }

    /// Check if this error indicates corruption.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corruption(_) | Error::InvalidFormat(_))
    }

    /// Check if this is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::corruption("bad data");
        assert_eq!(format!("{}", err), "Corruption detected: bad data");

        let err = Error::not_found("table file not found");
        assert_eq!(format!("{}", err), "Not found: table file not found");
    }

    #[test]
    fn test_error_kinds() {
        assert!(Error::corruption("bad").is_corruption());
        assert!(Error::invalid_format("magic").is_corruption());
        assert!(!Error::io("disk").is_corruption());

        assert!(Error::io("disk").is_io());
        assert!(Error::not_found("x").is_not_found());
        assert!(!Error::not_found("x").is_io());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "no such file");
        let err: Error = io_err.into();
        assert!(err.is_io());
        assert!(err.to_string().contains("no such file"));
    }
}

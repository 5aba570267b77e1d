//! Unified error type for the sco workspace
//!
//! [`ScoError`] is the boundary error shared by the loader, the optimizer and
//! the command-line front end. Crate-specific errors (for instance the
//! optimizer's `SecurityError`) convert into it so callers can use `?` across
//! crate boundaries.
//!
//! # Example
//!
//! ```ignore
//! use sco_core::{ScoError, ScoResult};
//!
//! fn run(path: &str) -> ScoResult<()> {
//!     let network = load_document(path)?;
//!     optimize(&network)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all sco operations.
#[derive(Error, Debug)]
pub enum ScoError {
    /// I/O errors (file access)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Element invariants violated (bounds, duplicate ids)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Sensitivity data that cannot be interpreted safely
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// Invalid optimization request
    #[error("Configuration error: {0}")]
    Config(String),

    /// LP solver failures
    #[error("Solver error: {0}")]
    Solver(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using ScoError.
pub type ScoResult<T> = Result<T, ScoError>;

impl From<anyhow::Error> for ScoError {
    fn from(err: anyhow::Error) -> Self {
        ScoError::Other(err.to_string())
    }
}

impl From<String> for ScoError {
    fn from(s: String) -> Self {
        ScoError::Other(s)
    }
}

impl From<&str> for ScoError {
    fn from(s: &str) -> Self {
        ScoError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for ScoError {
    fn from(err: serde_json::Error) -> Self {
        ScoError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ScoError::DataIntegrity("missing referenceCurrent".into());
        assert!(err.to_string().contains("Data integrity error"));
        assert!(err.to_string().contains("referenceCurrent"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ScoError = io_err.into();
        assert!(matches!(err, ScoError::Io(_)));
    }

    #[test]
    fn test_json_error_is_parse() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: ScoError = json_err.into();
        assert!(matches!(err, ScoError::Parse(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> ScoResult<()> {
            Err(ScoError::Config("unknown element".into()))
        }

        fn outer() -> ScoResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(ScoError::Config(_))));
    }
}

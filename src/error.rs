//! Error types for PathDB
//!
//! Provides structured error types with context for better debugging
//! and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for PathDB operations
#[derive(Debug, Error)]
pub enum Error {
    // ==========================================================================
    // Set Errors
    // ==========================================================================
    #[error("Set '{name}' does not exist")]
    SetNotFound { name: String },

    #[error("Set '{name}' already exists")]
    SetAlreadyExists { name: String },

    #[error("Failed to create set '{name}': {source}")]
    SetCreateFailed {
        name: String,
        #[source]
        source: std::io::Error,
    },

    // ==========================================================================
    // Record Errors
    // ==========================================================================
    #[error("Record '{key}' not found in set '{set}'")]
    RecordNotFound { set: String, key: String },

    #[error("Record '{key}' already exists in set '{set}'")]
    RecordAlreadyExists { set: String, key: String },

    #[error("Bin '{bin}' not present on record")]
    BinNotFound { bin: String },

    // ==========================================================================
    // Path Evaluation Errors
    // ==========================================================================
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Division by zero in filter expression")]
    DivisionByZero,

    #[error("Invalid regex '{pattern}': {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("Path step '{step}' did not resolve")]
    PathUnresolved { step: String },

    // ==========================================================================
    // Validation Errors
    // ==========================================================================
    #[error("Invalid {kind} '{value}': {reason}")]
    InvalidIdentifier {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Reserved name '{name}' cannot be used")]
    ReservedName { name: String },

    // ==========================================================================
    // Query Errors
    // ==========================================================================
    #[error("Query parse error: {message}")]
    ParseError { message: String },

    #[error("Query execution error: {message}")]
    QueryError { message: String },

    // ==========================================================================
    // IO Errors
    // ==========================================================================
    #[error("Failed to read file '{path}': {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ==========================================================================
    // Serialization Errors
    // ==========================================================================
    #[error("Failed to parse JSON: {message}")]
    JsonParseError { message: String },

    // ==========================================================================
    // Catch-all
    // ==========================================================================
    #[error("{0}")]
    Other(String),
}

/// Result type alias for PathDB operations
pub type Result<T> = std::result::Result<T, Error>;

// =============================================================================
// Conversions from external error types
// =============================================================================

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Other(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::JsonParseError {
            message: err.to_string(),
        }
    }
}

impl From<pathql::ParseError> for Error {
    fn from(err: pathql::ParseError) -> Self {
        Error::ParseError {
            message: err.to_string(),
        }
    }
}

impl From<crate::validation::ValidationError> for Error {
    fn from(err: crate::validation::ValidationError) -> Self {
        match err {
            crate::validation::ValidationError::InvalidIdentifier(value, reason) => {
                Error::InvalidIdentifier {
                    kind: "identifier",
                    value,
                    reason,
                }
            }
            crate::validation::ValidationError::TooLong(value, _max) => Error::InvalidIdentifier {
                kind: "identifier",
                value,
                reason: "exceeds maximum length",
            },
            crate::validation::ValidationError::Empty => Error::InvalidIdentifier {
                kind: "identifier",
                value: String::new(),
                reason: "cannot be empty",
            },
            crate::validation::ValidationError::Reserved(name) => Error::ReservedName { name },
        }
    }
}

// =============================================================================
// Error Display Helpers
// =============================================================================

impl Error {
    /// Returns a user-friendly suggestion for fixing the error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::SetNotFound { .. } => {
                Some("Insert a record first with: pathdb put <set> <key> <file.json>")
            }
            Error::RecordNotFound { .. } => {
                Some("Check the record key and set name")
            }
            Error::BinNotFound { .. } => {
                Some("Check the bin name given in FROM")
            }
            Error::TypeMismatch { .. } => {
                Some("Add NOFAIL to tolerate malformed nested data")
            }
            Error::InvalidIdentifier { .. } => {
                Some("Use only letters, numbers, underscores, and hyphens")
            }
            Error::ParseError { .. } => {
                Some("Statements look like: SELECT TREE FROM <bin> AT <path>")
            }
            _ => None,
        }
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::SetNotFound { .. }
                | Error::RecordNotFound { .. }
                | Error::BinNotFound { .. }
                | Error::InvalidIdentifier { .. }
                | Error::ParseError { .. }
        )
    }

    /// Returns true if this error comes from malformed nested data.
    ///
    /// These are the errors the NOFAIL flag downgrades to a non-match.
    pub fn is_malformed_data(&self) -> bool {
        matches!(self, Error::TypeMismatch { .. } | Error::DivisionByZero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RecordNotFound {
            set: "products".to_string(),
            key: "catalog".to_string(),
        };
        assert_eq!(err.to_string(), "Record 'catalog' not found in set 'products'");
    }

    #[test]
    fn test_error_suggestion() {
        let err = Error::SetNotFound {
            name: "products".to_string(),
        };
        assert!(err.suggestion().is_some());
    }

    #[test]
    fn test_malformed_data_predicate() {
        let err = Error::TypeMismatch { expected: "int", actual: "string" };
        assert!(err.is_malformed_data());
        assert!(Error::DivisionByZero.is_malformed_data());
        assert!(!Error::DivisionByZero.is_recoverable());
    }
}

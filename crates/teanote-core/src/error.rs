//! Error types for teanote.

use thiserror::Error;

use crate::rating::AxisViolation;

/// Result type alias using teanote's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for teanote operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error). Any failure inside a
    /// transaction rolls the whole transaction back.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Missing or invalid configuration (e.g. connection string)
    #[error("Configuration error: {0}")]
    Config(String),

    /// No active rating schema for the given code
    #[error("Rating schema not found: {code}")]
    SchemaNotFound { code: String },

    /// Note not found
    #[error("Note not found: {0}")]
    NoteNotFound(i32),

    /// One or more axis values were rejected
    #[error("Validation failed: {}", format_violations(.0))]
    Validation(Vec<AxisViolation>),

    /// Malformed legacy ratings payload
    #[error("Parse error: {0}")]
    Parse(String),

    /// Migration refused or failed a precondition
    #[error("Migration error: {0}")]
    Migration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn format_violations(violations: &[AxisViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// HTTP-class status code for surfacing this error from a live request.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 422,
            Error::Parse(_) | Error::Serialization(_) => 400,
            Error::SchemaNotFound { .. } | Error::NoteNotFound(_) => 404,
            Error::Config(_) | Error::Database(_) | Error::Migration(_) | Error::Io(_) => 500,
        }
    }

    /// Violations carried by a validation error, empty otherwise.
    pub fn violations(&self) -> &[AxisViolation] {
        match self {
            Error::Validation(v) => v,
            _ => &[],
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_schema_not_found() {
        let err = Error::SchemaNotFound {
            code: "STANDARD".to_string(),
        };
        assert_eq!(err.to_string(), "Rating schema not found: STANDARD");
    }

    #[test]
    fn test_error_display_note_not_found() {
        let err = Error::NoteNotFound(42);
        assert_eq!(err.to_string(), "Note not found: 42");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("DATABASE_URL is not set".to_string());
        assert_eq!(err.to_string(), "Configuration error: DATABASE_URL is not set");
    }

    #[test]
    fn test_validation_lists_every_violation() {
        let err = Error::Validation(vec![
            AxisViolation::UnknownAxis {
                code: "AROMA".to_string(),
            },
            AxisViolation::OutOfRange {
                code: "RICHNESS".to_string(),
                value: 7.0,
                min: 1.0,
                max: 5.0,
            },
        ]);
        let msg = err.to_string();
        assert!(msg.starts_with("Validation failed:"));
        assert!(msg.contains("AROMA"));
        assert!(msg.contains("RICHNESS"));
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Validation(vec![]).status_code(), 422);
        assert_eq!(Error::NoteNotFound(1).status_code(), 404);
        assert_eq!(
            Error::SchemaNotFound {
                code: "X".to_string()
            }
            .status_code(),
            404
        );
        assert_eq!(Error::Migration("x".to_string()).status_code(), 500);
        assert_eq!(Error::Database(sqlx::Error::RowNotFound).status_code(), 500);
    }

    #[test]
    fn test_violations_empty_for_other_errors() {
        assert!(Error::Parse("bad".to_string()).violations().is_empty());
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid json").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}

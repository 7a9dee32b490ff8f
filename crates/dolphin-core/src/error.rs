// Allow unused assignments for diagnostic fields - they're used by the macros
#![allow(unused_assignments)]

use miette::Diagnostic;
use thiserror::Error;

/// Core error type for Dolphin operations
#[derive(Error, Debug, Diagnostic)]
pub enum DolphinError {
    /// Object not found
    #[error("Object not found: {object_key}")]
    #[diagnostic(
        code(dolphin::object_not_found),
        help("Verify the object name, namespace, and kind are correct")
    )]
    ObjectNotFound {
        #[allow(unused)]
        object_key: String,
    },

    /// Conflict detected (stale resourceVersion)
    #[error("Conflict on {object_key}: expected resourceVersion {expected}, found {actual}")]
    #[diagnostic(
        code(dolphin::conflict),
        help("The object was modified concurrently. The next reconciliation pass will retry against the latest version")
    )]
    Conflict {
        #[allow(unused)]
        object_key: String,
        #[allow(unused)]
        expected: String,
        #[allow(unused)]
        actual: String,
    },

    /// Invalid resource
    #[error("Invalid resource: {reason}")]
    #[diagnostic(code(dolphin::invalid_resource), help("{suggestion}"))]
    InvalidResource {
        #[allow(unused)]
        reason: String,
        #[allow(unused)]
        suggestion: String,
    },

    /// Serialization error
    #[error("Serialization error: {message}")]
    #[diagnostic(
        code(dolphin::serialization_error),
        help("Ensure the resource format is valid JSON or YAML")
    )]
    SerializationError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// I/O error
    #[error("I/O error: {message}")]
    #[diagnostic(
        code(dolphin::io_error),
        help("Check that the file exists and is readable")
    )]
    IoError {
        #[allow(unused)]
        message: String,
        #[source]
        #[allow(unused)]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

/// Result type alias for Dolphin operations
pub type Result<T> = std::result::Result<T, DolphinError>;

impl DolphinError {
    /// Create an ObjectNotFound error
    pub fn object_not_found(object_key: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            object_key: object_key.into(),
        }
    }

    /// Create a Conflict error
    pub fn conflict(
        object_key: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::Conflict {
            object_key: object_key.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create an InvalidResource error
    pub fn invalid_resource(reason: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::InvalidResource {
            reason: reason.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a SerializationError
    pub fn serialization_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source,
        }
    }

    /// Create an IoError
    pub fn io_error(
        message: impl Into<String>,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::IoError {
            message: message.into(),
            source,
        }
    }

    /// Whether this error is a stale-version conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

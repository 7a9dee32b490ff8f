use miette::Diagnostic;
use thiserror::Error;

/// Controller error type for apply and reconciliation
#[derive(Error, Debug, Diagnostic)]
pub enum ControllerError {
    /// Object identity is incomplete
    #[error("Invalid object identity: {message}")]
    #[diagnostic(
        code(dolphin::controller::invalid_identity),
        help("Both metadata.name and metadata.namespace must be set on the object passed to apply")
    )]
    InvalidIdentity {
        #[allow(unused)]
        message: String,
    },

    /// Stored bytes could not be (de)serialized
    #[error("Serialization error for {object_key}: {message}")]
    #[diagnostic(
        code(dolphin::controller::serialization_error),
        help("The stored object may have been written by an incompatible version. Delete it and let the next pass recreate it")
    )]
    SerializationError {
        #[allow(unused)]
        object_key: String,
        #[allow(unused)]
        message: String,
    },

    /// Core library error
    #[error(transparent)]
    #[diagnostic(transparent)]
    CoreError(#[from] dolphin_core::DolphinError),

    /// Storage error
    #[error(transparent)]
    #[diagnostic(transparent)]
    StorageError(#[from] dolphin_storage::StorageError),
}

/// Result type alias for controller operations
pub type Result<T> = std::result::Result<T, ControllerError>;

impl ControllerError {
    /// Whether this is an optimistic-concurrency conflict from the store
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::CoreError(e) if e.is_conflict())
    }

    pub fn invalid_identity(message: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            message: message.into(),
        }
    }

    pub fn serialization_error(object_key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SerializationError {
            object_key: object_key.into(),
            message: message.into(),
        }
    }
}

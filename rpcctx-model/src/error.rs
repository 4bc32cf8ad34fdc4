//! Error types shared by the model and the proxy layer.

use thiserror::Error;

/// Result type for model and proxy operations.
pub type ContextResult<T> = Result<T, ContextError>;

/// Errors raised while resolving or accessing context values.
///
/// Missing data is never an error here: an absent id, a lookup miss or an
/// unset dependency all degrade to `Value::Null`.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A reference or collection value is not null, an instance, a map or a number.
    #[error("invalid reference value for field: {field}")]
    InvalidReference { field: String },

    /// A nested proxy could not be built for the target type.
    #[error("cannot instantiate proxy for {entity}: {reason}")]
    InstantiationFailure { entity: String, reason: String },

    /// The schema registry has no entity type with this name.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    /// The entity type declares no field with this name.
    #[error("unknown field '{field}' on {entity}")]
    UnknownField { entity: String, field: String },

    /// A custom setter refused the value.
    #[error("setter rejected value for {field}: {reason}")]
    SetterRejected { field: String, reason: String },

    /// The operation is not available on a proxy object.
    #[error("unsupported operation on proxy object: {0}")]
    Unsupported(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error while reading a schema document.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContextError {
    /// Shorthand for [`ContextError::SetterRejected`], for use inside custom setters.
    pub fn rejected(field: &str, reason: impl Into<String>) -> Self {
        Self::SetterRejected {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

//! Error types for the operator module.

use thiserror::Error;

/// Errors that can occur while talking to the operator.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The operator answered but refused the request.
    #[error("operator rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// A bounded connect loop ran out of attempts.
    #[error("gave up connecting after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// Message validation failed.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for operator operations.
pub type Result<T> = std::result::Result<T, OperatorError>;

//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while sealing documents or handling permission payloads.
#[derive(Debug, Error)]
pub enum PermsError {
    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Wrapping or unwrapping a document key failed.
    #[error("key wrap error: {0}")]
    KeyWrapError(String),

    /// The envelope does not have the two-segment shape.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// A permission or consent payload failed validation.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Core error.
    #[error("core error: {0}")]
    CoreError(#[from] consent_kernel_core::CoreError),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;

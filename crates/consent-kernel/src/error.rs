//! Error types for the kernel.

use consent_kernel_core::CoreError;
use consent_kernel_operator::OperatorError;
use consent_kernel_perms::PermsError;
use consent_kernel_store::StoreError;
use thiserror::Error;

/// Errors that can occur during kernel operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// A key that had to exist is missing (or has already expired).
    #[error("no such key: {0}")]
    KeyNotFound(String),

    /// No own key id is registered for the consent.
    #[error("no key found for consent {0}")]
    NoConsentKey(String),

    /// The document was not wrapped for this reader.
    #[error("no matching decryption key found for {0}")]
    NoMatchingKey(String),

    /// Malformed inbound payload or configuration.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Key generation, wrapping or body cipher failure.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// Signing or verifying a token failed.
    #[error("token error: {0}")]
    Token(String),

    /// Talking to the operator failed.
    #[error("operator error: {0}")]
    Operator(#[from] OperatorError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl KernelError {
    /// Whether callers should treat this as an expected outcome rather than a fault.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KernelError::NoMatchingKey(_))
    }
}

impl From<CoreError> for KernelError {
    fn from(e: CoreError) -> Self {
        KernelError::Crypto(e.to_string())
    }
}

impl From<PermsError> for KernelError {
    fn from(e: PermsError) -> Self {
        match e {
            PermsError::InvalidPayload(msg) => KernelError::Validation(msg),
            PermsError::SerializationError(msg) => KernelError::Serialization(msg),
            other => KernelError::Crypto(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for KernelError {
    fn from(e: serde_json::Error) -> Self {
        KernelError::Serialization(e.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for KernelError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        KernelError::Token(e.to_string())
    }
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;

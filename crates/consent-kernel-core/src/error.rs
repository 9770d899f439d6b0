//! Error types for the consent kernel core.

use thiserror::Error;

/// Core errors that can occur while handling key material.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    #[error("missing private key for {0}")]
    MissingPrivateKey(String),

    #[error("unsupported key type: {0}")]
    UnsupportedKeyType(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

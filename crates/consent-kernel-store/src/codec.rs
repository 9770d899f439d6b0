//! Value encoding.
//!
//! Structured values are stored as the standard base64 of their compact JSON
//! text. Stores written by other client implementations of the protocol use
//! the same layout, so the bytes are interchangeable.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Encode a value as `base64(JSON(value))`.
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    let json = serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(Bytes::from(STANDARD.encode(json)))
}

/// Decode a value written by [`encode_value`].
pub fn decode_value<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let json = STANDARD
        .decode(bytes)
        .map_err(|e| StoreError::InvalidData(format!("value is not base64: {}", e)))?;
    serde_json::from_slice(&json).map_err(|e| StoreError::Serialization(e.to_string()))
}

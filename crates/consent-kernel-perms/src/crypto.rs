//! Cryptographic primitives for document encryption.
//!
//! A document is encrypted with a fresh 256-bit [`DocumentKey`]. That key is
//! then wrapped once per recipient with RSA-OAEP (SHA-1, MGF1-SHA-1), the
//! padding every client of the protocol uses by default.
//!
//! Two body schemes are supported:
//!
//! - [`BodyScheme::Aes256Cbc`]: `IV(16) || AES-256-CBC(PKCS#7)`, the wire format
//!   shared with other clients. No integrity protection.
//! - [`BodyScheme::ChaCha20Poly1305`]: `nonce(12) || ciphertext || tag(16)`.
//!   Authenticated, but only readable by peers configured for it.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha1::Sha1;

use crate::error::{PermsError, Result};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Length of a document key in bytes.
pub const DOCUMENT_KEY_LEN: usize = 32;

/// Length of the CBC initialization vector.
pub const IV_LEN: usize = 16;

/// Length of the ChaCha20-Poly1305 nonce.
pub const NONCE_LEN: usize = 12;

const AES_BLOCK_LEN: usize = 16;

/// Symmetric scheme used for document bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BodyScheme {
    /// AES-256-CBC with PKCS#7 padding and a random IV prefix.
    #[default]
    #[serde(rename = "aes-256-cbc")]
    Aes256Cbc,

    /// ChaCha20-Poly1305 with a random nonce prefix.
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

/// A 256-bit symmetric document key.
#[derive(Clone, PartialEq, Eq)]
pub struct DocumentKey([u8; DOCUMENT_KEY_LEN]);

impl DocumentKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; DOCUMENT_KEY_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; DOCUMENT_KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; DOCUMENT_KEY_LEN] = bytes.try_into().map_err(|_| {
            PermsError::KeyWrapError(format!(
                "document key must be {} bytes, got {}",
                DOCUMENT_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; DOCUMENT_KEY_LEN] {
        &self.0
    }

    /// Wrap this key for a recipient with RSA-OAEP.
    pub fn wrap(&self, recipient: &RsaPublicKey) -> Result<Vec<u8>> {
        recipient
            .encrypt(&mut rand::thread_rng(), Oaep::new::<Sha1>(), &self.0)
            .map_err(|e| PermsError::KeyWrapError(e.to_string()))
    }

    /// Recover a key wrapped by [`DocumentKey::wrap`].
    pub fn unwrap_from(wrapped: &[u8], private: &RsaPrivateKey) -> Result<Self> {
        let bytes = private
            .decrypt(Oaep::new::<Sha1>(), wrapped)
            .map_err(|e| PermsError::KeyWrapError(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Encrypt a document body.
    pub fn encrypt(&self, scheme: BodyScheme, plaintext: &[u8]) -> Result<Vec<u8>> {
        match scheme {
            BodyScheme::Aes256Cbc => {
                let mut iv = [0u8; IV_LEN];
                rand::thread_rng().fill_bytes(&mut iv);
                self.encrypt_cbc(&iv, plaintext)
            }
            BodyScheme::ChaCha20Poly1305 => {
                let mut nonce = [0u8; NONCE_LEN];
                rand::thread_rng().fill_bytes(&mut nonce);
                let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
                    .map_err(|e| PermsError::EncryptionError(e.to_string()))?;
                let sealed = cipher
                    .encrypt(Nonce::from_slice(&nonce), plaintext)
                    .map_err(|e| PermsError::EncryptionError(e.to_string()))?;

                let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
                out.extend_from_slice(&nonce);
                out.extend_from_slice(&sealed);
                Ok(out)
            }
        }
    }

    /// Decrypt a document body produced by [`DocumentKey::encrypt`].
    pub fn decrypt(&self, scheme: BodyScheme, body: &[u8]) -> Result<Vec<u8>> {
        match scheme {
            BodyScheme::Aes256Cbc => {
                if body.len() < IV_LEN + AES_BLOCK_LEN || (body.len() - IV_LEN) % AES_BLOCK_LEN != 0 {
                    return Err(PermsError::DecryptionError(format!(
                        "cipher segment of {} bytes is not IV plus whole blocks",
                        body.len()
                    )));
                }
                let (iv, ciphertext) = body.split_at(IV_LEN);
                Aes256CbcDec::new_from_slices(&self.0, iv)
                    .map_err(|e| PermsError::DecryptionError(e.to_string()))?
                    .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                    .map_err(|_| PermsError::DecryptionError("bad padding".into()))
            }
            BodyScheme::ChaCha20Poly1305 => {
                if body.len() < NONCE_LEN {
                    return Err(PermsError::DecryptionError("missing nonce".into()));
                }
                let (nonce, sealed) = body.split_at(NONCE_LEN);
                let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
                    .map_err(|e| PermsError::DecryptionError(e.to_string()))?;
                cipher
                    .decrypt(Nonce::from_slice(nonce), sealed)
                    .map_err(|e| PermsError::DecryptionError(e.to_string()))
            }
        }
    }

    fn encrypt_cbc(&self, iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = Aes256CbcEnc::new_from_slices(&self.0, iv)
            .map_err(|e| PermsError::EncryptionError(e.to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
        out.extend_from_slice(iv);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }
}

impl std::fmt::Debug for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DocumentKey(..)")
    }
}

//! Encrypted document envelope.
//!
//! Wire format, two base64 segments joined by a single newline:
//!
//! ```text
//! base64(body) "\n" base64(JSON { kid: base64(wrapped document key), ... })
//! ```
//!
//! `body` is the output of [`DocumentKey::encrypt`]. Both segments use the
//! standard base64 alphabet with padding and never contain a newline.

use std::collections::BTreeMap;
use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};

use crate::crypto::{BodyScheme, DocumentKey};
use crate::error::{PermsError, Result};

/// Wrapped copies of one document key, by recipient kid.
///
/// Values are base64 RSA-OAEP ciphertexts of the same 32-byte key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentKeyMap(BTreeMap<String, String>);

impl DocumentKeyMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `key` for every recipient.
    pub fn wrap_for<'a, I>(key: &DocumentKey, recipients: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a RsaPublicKey)>,
    {
        let mut map = Self::new();
        for (kid, public) in recipients {
            map.insert(kid, &key.wrap(public)?);
        }
        Ok(map)
    }

    /// Record a wrapped key for `kid`.
    pub fn insert(&mut self, kid: &str, wrapped: &[u8]) {
        self.0.insert(kid.to_string(), STANDARD.encode(wrapped));
    }

    /// The wrapped key for `kid`, if `kid` is a recipient.
    pub fn wrapped_for(&self, kid: &str) -> Result<Option<Vec<u8>>> {
        self.0
            .get(kid)
            .map(|b64| {
                STANDARD.decode(b64).map_err(|e| {
                    PermsError::MalformedEnvelope(format!("wrapped key for {}: {}", kid, e))
                })
            })
            .transpose()
    }

    /// Whether `kid` is a recipient.
    pub fn contains(&self, kid: &str) -> bool {
        self.0.contains_key(kid)
    }

    /// Recipient kids in sorted order.
    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Number of recipients.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no recipients.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as the second envelope segment.
    pub fn to_segment(&self) -> Result<String> {
        let json =
            serde_json::to_vec(&self.0).map_err(|e| PermsError::SerializationError(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Decode the second envelope segment.
    pub fn from_segment(segment: &str) -> Result<Self> {
        let json = STANDARD
            .decode(segment)
            .map_err(|e| PermsError::MalformedEnvelope(format!("key segment: {}", e)))?;
        serde_json::from_slice(&json)
            .map_err(|e| PermsError::MalformedEnvelope(format!("key segment: {}", e)))
    }
}

/// A sealed document: body plus the wrapped keys able to open it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedDocument {
    /// IV/nonce-prefixed ciphertext.
    pub body: Vec<u8>,

    /// Wrapped document keys.
    pub keys: DocumentKeyMap,
}

impl EncryptedDocument {
    /// Encrypt `plaintext` under `key` and attach the wrapped keys.
    pub fn seal(
        plaintext: &[u8],
        key: &DocumentKey,
        keys: DocumentKeyMap,
        scheme: BodyScheme,
    ) -> Result<Self> {
        Ok(Self {
            body: key.encrypt(scheme, plaintext)?,
            keys,
        })
    }

    /// Decrypt the body with an already unwrapped key.
    pub fn open(&self, key: &DocumentKey, scheme: BodyScheme) -> Result<Vec<u8>> {
        key.decrypt(scheme, &self.body)
    }

    /// Serialize to the two-segment wire format.
    pub fn to_wire(&self) -> Result<String> {
        Ok(format!("{}\n{}", STANDARD.encode(&self.body), self.keys.to_segment()?))
    }

    /// Parse the two-segment wire format.
    pub fn parse(wire: &str) -> Result<Self> {
        let (body, keys) = wire
            .split_once('\n')
            .ok_or_else(|| PermsError::MalformedEnvelope("missing key segment".into()))?;
        if keys.contains('\n') {
            return Err(PermsError::MalformedEnvelope(
                "expected exactly two segments".into(),
            ));
        }
        if body.is_empty() || keys.is_empty() {
            return Err(PermsError::MalformedEnvelope("empty segment".into()));
        }

        let body = STANDARD
            .decode(body)
            .map_err(|e| PermsError::MalformedEnvelope(format!("cipher segment: {}", e)))?;
        Ok(Self {
            body,
            keys: DocumentKeyMap::from_segment(keys)?,
        })
    }
}

impl fmt::Display for EncryptedDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys = self.keys.to_segment().map_err(|_| fmt::Error)?;
        write!(f, "{}\n{}", STANDARD.encode(&self.body), keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::RsaPrivateKey;

    fn recipient() -> (RsaPrivateKey, RsaPublicKey) {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let public = private.to_public_key();
        (private, public)
    }

    #[test]
    fn test_wire_shape() {
        let (_, public) = recipient();
        let key = DocumentKey::generate();
        let keys = DocumentKeyMap::wrap_for(&key, [("http://a/jwks/enc_1", &public)]).unwrap();
        let doc = EncryptedDocument::seal(br#"{"x":1}"#, &key, keys, BodyScheme::Aes256Cbc).unwrap();

        let wire = doc.to_wire().unwrap();
        assert_eq!(wire.matches('\n').count(), 1);
        assert_eq!(wire, doc.to_string());

        let (body, keys) = wire.split_once('\n').unwrap();
        assert_eq!(STANDARD.decode(body).unwrap().len(), 32);

        let map: BTreeMap<String, String> =
            serde_json::from_slice(&STANDARD.decode(keys).unwrap()).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(STANDARD.decode(&map["http://a/jwks/enc_1"]).unwrap().len(), 128);
    }

    #[test]
    fn test_every_recipient_opens() {
        let (p1, k1) = recipient();
        let (p2, k2) = recipient();
        let key = DocumentKey::generate();
        let keys = DocumentKeyMap::wrap_for(&key, [("r1", &k1), ("r2", &k2)]).unwrap();
        let wire = EncryptedDocument::seal(b"payload", &key, keys, BodyScheme::Aes256Cbc)
            .unwrap()
            .to_wire()
            .unwrap();

        let doc = EncryptedDocument::parse(&wire).unwrap();
        for (kid, private) in [("r1", &p1), ("r2", &p2)] {
            let wrapped = doc.keys.wrapped_for(kid).unwrap().unwrap();
            let key = DocumentKey::unwrap_from(&wrapped, private).unwrap();
            assert_eq!(doc.open(&key, BodyScheme::Aes256Cbc).unwrap(), b"payload");
        }
        assert!(doc.keys.wrapped_for("r3").unwrap().is_none());
    }

    #[test]
    fn test_aead_keeps_two_segment_shape() {
        let key = DocumentKey::generate();
        let doc = EncryptedDocument::seal(b"x", &key, DocumentKeyMap::new(), BodyScheme::ChaCha20Poly1305)
            .unwrap();
        let parsed = EncryptedDocument::parse(&doc.to_wire().unwrap()).unwrap();
        assert_eq!(parsed.open(&key, BodyScheme::ChaCha20Poly1305).unwrap(), b"x");
    }

    #[test]
    fn test_parse_rejects_bad_shapes() {
        for wire in ["", "abc", "abc\n", "\nabc", "YQ==\ne30=\nextra", "!!\ne30="] {
            assert!(
                matches!(EncryptedDocument::parse(wire), Err(PermsError::MalformedEnvelope(_))),
                "accepted {:?}",
                wire
            );
        }
    }

    #[test]
    fn test_empty_key_map_segment() {
        // base64("{}")
        let doc = EncryptedDocument::parse("YQ==\ne30=").unwrap();
        assert!(doc.keys.is_empty());
        assert_eq!(doc.body, b"a");
    }
}

//! Key records.
//!
//! A [`Key`] with only a public half is a peer key; one with both halves is
//! an own key. The serialized shape is `{kid, use, publicKey, privateKey?}`.

use std::fmt;

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::jwk::{Jwk, KeyUse};
use crate::kid::Kid;
use crate::thumbprint::thumbprint;

/// Smallest modulus accepted for generated keys.
pub const MIN_MODULUS_BITS: usize = 1024;

/// A key record.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Key {
    /// Absolute key identifier.
    pub kid: Kid,

    /// Intended use.
    #[serde(rename = "use")]
    pub key_use: KeyUse,

    /// Public half.
    pub public_key: Jwk,

    /// Private half (own keys only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<Jwk>,
}

impl Key {
    /// Generate a fresh RSA key pair.
    ///
    /// The identifier is `<jwks_base>/<use>_<thumbprint>` unless `explicit_kid`
    /// is given, in which case it is only prefixed when relative.
    pub fn generate(
        jwks_base: &str,
        key_use: KeyUse,
        modulus_bits: usize,
        explicit_kid: Option<&str>,
    ) -> Result<Self> {
        if modulus_bits < MIN_MODULUS_BITS {
            return Err(CoreError::KeyGeneration(format!(
                "modulus length {} is below {}",
                modulus_bits, MIN_MODULUS_BITS
            )));
        }

        let private = RsaPrivateKey::new(&mut rand::thread_rng(), modulus_bits)
            .map_err(|e| CoreError::KeyGeneration(e.to_string()))?;
        Self::from_private(jwks_base, key_use, &private, explicit_kid)
    }

    /// Build an own key from existing RSA private key material.
    pub fn from_private(
        jwks_base: &str,
        key_use: KeyUse,
        private: &RsaPrivateKey,
        explicit_kid: Option<&str>,
    ) -> Result<Self> {
        let public_jwk = Jwk::from_public(&private.to_public_key());
        let kid = match explicit_kid {
            Some(kid) => Kid::named(jwks_base, kid),
            None => Kid::under(
                jwks_base,
                &format!("{}_{}", key_use.as_str(), thumbprint(&public_jwk)),
            ),
        };

        let public_key = public_jwk.with_metadata(kid.as_str(), key_use, None);
        let private_key = Jwk::from_private(private)?.with_metadata(kid.as_str(), key_use, None);

        Ok(Self {
            kid,
            key_use,
            public_key,
            private_key: Some(private_key),
        })
    }

    /// Build a peer key from a public JWK.
    pub fn peer(kid: Kid, key_use: KeyUse, public_key: &Jwk) -> Self {
        let public_key = public_key
            .public_view()
            .with_metadata(kid.as_str(), key_use, public_key.alg.as_deref());
        Self {
            kid,
            key_use,
            public_key,
            private_key: None,
        }
    }

    /// Build a peer key from a PEM public key (SPKI or PKCS#1).
    pub fn from_public_pem(kid: Kid, key_use: KeyUse, pem: &str) -> Result<Self> {
        let public = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))
            .map_err(|e| CoreError::DecodingError(format!("public key pem: {}", e)))?;
        Ok(Self::peer(kid, key_use, &Jwk::from_public(&public)))
    }

    /// Encode the public half as SPKI PEM.
    pub fn to_public_pem(&self) -> Result<String> {
        self.rsa_public()?
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Whether the private half is present.
    pub fn is_own(&self) -> bool {
        self.private_key.is_some()
    }

    /// Copy without the private half.
    pub fn public_only(&self) -> Self {
        Self {
            kid: self.kid.clone(),
            key_use: self.key_use,
            public_key: self.public_key.public_view(),
            private_key: None,
        }
    }

    /// The public JWK advertised for this key.
    pub fn to_jwk(&self) -> Jwk {
        self.public_key.public_view()
    }

    /// Thumbprint of the public half.
    pub fn thumbprint(&self) -> String {
        thumbprint(&self.public_key)
    }

    /// Decode the public half.
    pub fn rsa_public(&self) -> Result<RsaPublicKey> {
        self.public_key.to_public_key()
    }

    /// Decode the private half.
    pub fn rsa_private(&self) -> Result<RsaPrivateKey> {
        self.private_key
            .as_ref()
            .ok_or_else(|| CoreError::MissingPrivateKey(self.kid.to_string()))?
            .to_private_key()
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("kid", &self.kid)
            .field("use", &self.key_use)
            .field("own", &self.is_own())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:4000/jwks";

    #[test]
    fn test_generated_kid_shape() {
        let key = Key::generate(BASE, KeyUse::Enc, 1024, None).unwrap();
        let prefix = format!("{}/enc_", BASE);
        assert!(key.kid.as_str().starts_with(&prefix));
        assert_eq!(key.kid.as_str(), format!("{}{}", prefix, key.thumbprint()));
        assert!(key.is_own());
    }

    #[test]
    fn test_kid_is_derived_from_public_material() {
        let private = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let a = Key::from_private(BASE, KeyUse::Enc, &private, None).unwrap();
        let b = Key::from_private(BASE, KeyUse::Enc, &private, None).unwrap();
        assert_eq!(a.kid, b.kid);

        // Same material under a different use shares the thumbprint suffix.
        let s = Key::from_private(BASE, KeyUse::Sig, &private, None).unwrap();
        assert_eq!(a.thumbprint(), s.thumbprint());
        assert!(s.kid.as_str().ends_with(&format!("sig_{}", a.thumbprint())));
    }

    #[test]
    fn test_explicit_kid() {
        let key = Key::generate(BASE, KeyUse::Enc, 1024, Some("foo")).unwrap();
        assert_eq!(key.kid.as_str(), "http://localhost:4000/jwks/foo");

        let key = Key::generate(BASE, KeyUse::Enc, 1024, Some("http://localhost:4000/jwks/bar")).unwrap();
        assert_eq!(key.kid.as_str(), "http://localhost:4000/jwks/bar");
    }

    #[test]
    fn test_rejects_tiny_modulus() {
        assert!(matches!(
            Key::generate(BASE, KeyUse::Enc, 512, None),
            Err(CoreError::KeyGeneration(_))
        ));
    }

    #[test]
    fn test_public_only_and_serde_shape() {
        let key = Key::generate(BASE, KeyUse::Enc, 1024, None).unwrap();
        let public = key.public_only();
        assert!(!public.is_own());
        assert!(public.rsa_private().is_err());

        let json = serde_json::to_value(&key).unwrap();
        assert_eq!(json["use"], "enc");
        assert!(json.get("publicKey").is_some());
        assert!(json.get("privateKey").is_some());

        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("privateKey").is_none());
    }

    #[test]
    fn test_pem_roundtrip_keeps_identity() {
        let key = Key::generate(BASE, KeyUse::Enc, 1024, None).unwrap();
        let pem = key.to_public_pem().unwrap();
        let peer = Key::from_public_pem(key.kid.clone(), KeyUse::Enc, &pem).unwrap();

        assert_eq!(peer.thumbprint(), key.thumbprint());
        assert!(!peer.is_own());
    }

    #[test]
    fn test_debug_hides_material() {
        let key = Key::generate(BASE, KeyUse::Enc, 1024, None).unwrap();
        let debug = format!("{:?}", key);
        assert!(!debug.contains(key.private_key.as_ref().unwrap().d.as_deref().unwrap()));
    }
}

//! JSON Web Keys for RSA key material.
//!
//! Big integers are base64url (no padding) encoded big-endian bytes, as in
//! RFC 7518 §6.3. Private members are skipped when absent so a public view
//! serializes to the bare `{kty, kid, use, alg, n, e}` shape.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Intended use of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
    /// Signing.
    Sig,
    /// Encryption.
    Enc,
}

impl KeyUse {
    /// The wire name (`sig` / `enc`).
    pub const fn as_str(&self) -> &'static str {
        match self {
            KeyUse::Sig => "sig",
            KeyUse::Enc => "enc",
        }
    }
}

/// An RSA JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<KeyUse>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    pub n: String,
    pub e: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
}

/// A JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Create a set from keys.
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Jwk {
    /// Build the public JWK of an RSA public key.
    pub fn from_public(key: &RsaPublicKey) -> Self {
        Self {
            kty: "RSA".to_string(),
            kid: None,
            key_use: None,
            alg: None,
            n: encode_uint(key.n()),
            e: encode_uint(key.e()),
            d: None,
            p: None,
            q: None,
        }
    }

    /// Build the private JWK of an RSA private key (two-prime keys only).
    pub fn from_private(key: &RsaPrivateKey) -> Result<Self> {
        let primes = key.primes();
        if primes.len() != 2 {
            return Err(CoreError::UnsupportedKeyType(format!(
                "RSA key with {} primes",
                primes.len()
            )));
        }
        let mut jwk = Self::from_public(&key.to_public_key());
        jwk.d = Some(encode_uint(key.d()));
        jwk.p = Some(encode_uint(&primes[0]));
        jwk.q = Some(encode_uint(&primes[1]));
        Ok(jwk)
    }

    /// Set the identifier, use and algorithm members.
    pub fn with_metadata(mut self, kid: &str, key_use: KeyUse, alg: Option<&str>) -> Self {
        self.kid = Some(kid.to_string());
        self.key_use = Some(key_use);
        self.alg = alg.map(String::from);
        self
    }

    /// Whether this JWK carries private members.
    pub fn is_private(&self) -> bool {
        self.d.is_some()
    }

    /// Copy without any private members.
    pub fn public_view(&self) -> Self {
        Self {
            d: None,
            p: None,
            q: None,
            ..self.clone()
        }
    }

    /// Decode into an RSA public key.
    pub fn to_public_key(&self) -> Result<RsaPublicKey> {
        self.ensure_rsa()?;
        let n = decode_uint(&self.n, "n")?;
        let e = decode_uint(&self.e, "e")?;
        RsaPublicKey::new(n, e).map_err(|e| CoreError::InvalidKeyMaterial(e.to_string()))
    }

    /// Decode into an RSA private key.
    pub fn to_private_key(&self) -> Result<RsaPrivateKey> {
        self.ensure_rsa()?;
        let missing = || {
            CoreError::MissingPrivateKey(self.kid.clone().unwrap_or_else(|| "<unnamed>".into()))
        };
        let d = self.d.as_deref().ok_or_else(missing)?;
        let p = self.p.as_deref().ok_or_else(missing)?;
        let q = self.q.as_deref().ok_or_else(missing)?;

        RsaPrivateKey::from_components(
            decode_uint(&self.n, "n")?,
            decode_uint(&self.e, "e")?,
            decode_uint(d, "d")?,
            vec![decode_uint(p, "p")?, decode_uint(q, "q")?],
        )
        .map_err(|e| CoreError::InvalidKeyMaterial(e.to_string()))
    }

    fn ensure_rsa(&self) -> Result<()> {
        if self.kty == "RSA" {
            Ok(())
        } else {
            Err(CoreError::UnsupportedKeyType(self.kty.clone()))
        }
    }
}

fn encode_uint(value: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(value.to_bytes_be())
}

fn decode_uint(value: &str, member: &str) -> Result<BigUint> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| CoreError::DecodingError(format!("jwk member {}: {}", member, e)))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

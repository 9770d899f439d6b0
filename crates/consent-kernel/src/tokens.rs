//! Token service: signs claim sets with a key and verifies inbound tokens.
//!
//! The kernel only needs two operations, so the JOSE stack sits behind the
//! [`TokenService`] trait. [`JwtTokenService`] implements it with RS256 JWTs,
//! resolving verification keys through the [`KeyProvider`] by the header
//! `kid`.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::EncodeRsaPrivateKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use consent_kernel_core::{Key, KeyUse};
use consent_kernel_operator::Claims;
use consent_kernel_store::KeyValueStore;

use crate::config::SUPPORTED_ALG;
use crate::error::{KernelError, Result};
use crate::keys::KeyProvider;

/// Protected header members the kernel cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl TokenHeader {
    /// An RS256 header naming `key`.
    pub fn for_key(key: &Key) -> Self {
        Self {
            alg: SUPPORTED_ALG.to_string(),
            kid: Some(key.kid.to_string()),
        }
    }
}

/// A token whose signature checked out.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    pub header: TokenHeader,
    pub payload: Value,
}

/// Signs and verifies claim sets.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait TokenService: Send + Sync {
    /// Sign `claims` with the private half of `key`.
    async fn sign(&self, claims: &Value, key: &Key, header: &TokenHeader) -> Result<String>;

    /// Check the signature of `token` and return its header and payload.
    async fn verify(&self, token: &str) -> Result<VerifiedToken>;
}

/// Sign a handshake claim set with `key`, naming it in the header.
pub async fn sign_claims(tokens: &dyn TokenService, claims: &Claims, key: &Key) -> Result<String> {
    let value = claims
        .to_value()
        .map_err(|e| KernelError::Serialization(e.to_string()))?;
    tokens.sign(&value, key, &TokenHeader::for_key(key)).await
}

/// RS256 JWTs backed by the key provider.
pub struct JwtTokenService<S: KeyValueStore> {
    keys: Arc<KeyProvider<S>>,
}

impl<S: KeyValueStore> JwtTokenService<S> {
    /// Create a token service resolving keys through `keys`.
    pub fn new(keys: Arc<KeyProvider<S>>) -> Self {
        Self { keys }
    }
}

fn algorithm(alg: &str) -> Result<Algorithm> {
    if alg == SUPPORTED_ALG {
        Ok(Algorithm::RS256)
    } else {
        Err(KernelError::Token(format!("unsupported alg {}", alg)))
    }
}

#[async_trait]
impl<S: KeyValueStore> TokenService for JwtTokenService<S> {
    async fn sign(&self, claims: &Value, key: &Key, header: &TokenHeader) -> Result<String> {
        let mut jwt_header = Header::new(algorithm(&header.alg)?);
        jwt_header.kid = header.kid.clone().or_else(|| Some(key.kid.to_string()));

        let der = key
            .rsa_private()?
            .to_pkcs1_der()
            .map_err(|e| KernelError::Crypto(format!("encode signing key: {}", e)))?;
        let encoding_key = EncodingKey::from_rsa_der(der.as_bytes());

        Ok(jsonwebtoken::encode(&jwt_header, claims, &encoding_key)?)
    }

    async fn verify(&self, token: &str) -> Result<VerifiedToken> {
        let header = jsonwebtoken::decode_header(token)?;
        let kid = header
            .kid
            .clone()
            .ok_or_else(|| KernelError::Token("token header has no kid".into()))?;

        let key = self.keys.require_key(&kid).await?;
        if key.key_use != KeyUse::Sig {
            return Err(KernelError::Token(format!("{} is not a signing key", kid)));
        }
        let decoding_key = DecodingKey::from_rsa_components(&key.public_key.n, &key.public_key.e)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.required_spec_claims.clear();
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<Value>(token, &decoding_key, &validation)?;
        debug!(kid = %kid, "verified token");

        Ok(VerifiedToken {
            header: TokenHeader {
                alg: SUPPORTED_ALG.to_string(),
                kid: Some(kid),
            },
            payload: data.claims,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyOptions;
    use consent_kernel_store::MemoryStore;
    use rsa::RsaPrivateKey;
    use serde_json::json;
    use std::sync::OnceLock;

    // RS256 needs at least 2048-bit keys.
    fn signing_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap())
    }

    fn service() -> (Arc<KeyProvider<MemoryStore>>, JwtTokenService<MemoryStore>) {
        let keys = Arc::new(
            KeyProvider::new(
                "http://localhost:4000/jwks",
                signing_key(),
                KeyOptions::default(),
                Arc::new(MemoryStore::new()),
            )
            .unwrap(),
        );
        (keys.clone(), JwtTokenService::new(keys))
    }

    #[tokio::test]
    async fn test_sign_and_verify_with_client_key() {
        let (keys, tokens) = service();
        let client = keys.client_key();
        let claims = json!({"type": "ACCESS_TOKEN", "iss": "http://localhost:4000", "sub": "conn-1"});

        let token = tokens
            .sign(&claims, client, &TokenHeader::for_key(client))
            .await
            .unwrap();
        assert_eq!(token.split('.').count(), 3);

        let verified = tokens.verify(&token).await.unwrap();
        assert_eq!(verified.payload, claims);
        assert_eq!(
            verified.header.kid.as_deref(),
            Some("http://localhost:4000/jwks/client_key")
        );
    }

    #[tokio::test]
    async fn test_verify_with_peer_key() {
        let (keys, tokens) = service();
        let peer = Key::from_private(
            "mydata://account/jwks",
            KeyUse::Sig,
            signing_key(),
            Some("account_key"),
        )
        .unwrap();
        let token = tokens
            .sign(&json!({"sub": "x"}), &peer, &TokenHeader::for_key(&peer))
            .await
            .unwrap();

        assert!(matches!(
            tokens.verify(&token).await,
            Err(KernelError::KeyNotFound(kid)) if kid == "mydata://account/jwks/account_key"
        ));

        keys.save_key(&peer.public_only()).await.unwrap();
        assert_eq!(tokens.verify(&token).await.unwrap().payload["sub"], "x");
    }

    #[tokio::test]
    async fn test_encryption_key_cannot_verify() {
        let (keys, tokens) = service();
        let reader = Key::from_private(
            "http://reader.test/jwks",
            KeyUse::Enc,
            signing_key(),
            Some("reader_key"),
        )
        .unwrap();
        keys.save_key(&reader.public_only()).await.unwrap();

        let claims = json!({"type": "CONNECTION", "iss": "x", "sid": "s1", "sub": "c"});
        let token = tokens
            .sign(&claims, &reader, &TokenHeader::for_key(&reader))
            .await
            .unwrap();

        assert!(matches!(
            tokens.verify(&token).await,
            Err(KernelError::Token(msg)) if msg.contains("not a signing key")
        ));
    }

    #[tokio::test]
    async fn test_tampered_token_is_rejected() {
        let (keys, tokens) = service();
        let client = keys.client_key();
        let token = tokens
            .sign(&json!({"sub": "a"}), client, &TokenHeader::for_key(client))
            .await
            .unwrap();

        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = tokens
            .sign(&json!({"sub": "b"}), client, &TokenHeader::for_key(client))
            .await
            .unwrap();
        let forged_payload = forged.split('.').nth(1).unwrap().to_string();
        parts[1] = &forged_payload;
        parts[2] = "AAAA";

        assert!(matches!(
            tokens.verify(&parts.join(".")).await,
            Err(KernelError::Token(_))
        ));
    }

    #[tokio::test]
    async fn test_public_only_key_cannot_sign() {
        let (keys, tokens) = service();
        let public = keys.client_key().public_only();
        assert!(matches!(
            tokens
                .sign(&json!({}), &public, &TokenHeader::for_key(&public))
                .await,
            Err(KernelError::Crypto(_))
        ));
    }

    #[tokio::test]
    async fn test_unsupported_alg() {
        let (keys, tokens) = service();
        let header = TokenHeader {
            alg: "HS256".into(),
            kid: None,
        };
        assert!(matches!(
            tokens.sign(&json!({}), keys.client_key(), &header).await,
            Err(KernelError::Token(_))
        ));
    }
}

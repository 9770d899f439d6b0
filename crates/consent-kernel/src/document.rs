//! Document cipher: seals values for the readers of a scope and opens them
//! with this client's own key.
//!
//! A document is sealed with a random document key, which is wrapped once
//! per reader. The wrapped key map is cached per scope and reused as long as
//! one of its entries belongs to an own key that can unwrap it.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use consent_kernel_perms::{BodyScheme, DocumentKey, DocumentKeyMap, EncryptedDocument};
use consent_kernel_store::KeyValueStore;

use crate::error::{KernelError, Result};
use crate::keys::KeyProvider;
use crate::ledger::AccessLedger;

/// Encrypts and decrypts documents for consent scopes.
pub struct DocumentCipher<S: KeyValueStore> {
    keys: Arc<KeyProvider<S>>,
    ledger: AccessLedger<S>,
    scheme: BodyScheme,
}

impl<S: KeyValueStore> DocumentCipher<S> {
    /// Create a cipher using `scheme` for bodies.
    pub fn new(keys: Arc<KeyProvider<S>>, scheme: BodyScheme) -> Self {
        let ledger = AccessLedger::new(keys.clone());
        Self {
            keys,
            ledger,
            scheme,
        }
    }

    /// The body scheme in use.
    pub fn scheme(&self) -> BodyScheme {
        self.scheme
    }

    /// Serialize `value` as JSON and seal it for the readers of the scope.
    pub async fn encrypt<T: Serialize + ?Sized>(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
        value: &T,
    ) -> Result<String> {
        let plaintext = serde_json::to_vec(value)?;

        let (document_key, keys) = match self.reusable_key(consent_id, domain, area).await? {
            Some(found) => found,
            None => self.mint(consent_id, domain, area).await?,
        };

        let document = EncryptedDocument::seal(&plaintext, &document_key, keys, self.scheme)?;
        Ok(document.to_wire()?)
    }

    /// Open an envelope with this client's key for `consent_id` and parse the JSON inside.
    pub async fn decrypt<T: DeserializeOwned>(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
        envelope: &str,
    ) -> Result<T> {
        let document = EncryptedDocument::parse(envelope)?;
        let kid = self.ledger.get_consent_key_id(consent_id).await?;

        let wrapped = document
            .keys
            .wrapped_for(&kid)?
            .ok_or_else(|| KernelError::NoMatchingKey(kid.clone()))?;

        let private = self.keys.require_key(&kid).await?.rsa_private()?;
        let document_key = DocumentKey::unwrap_from(&wrapped, &private)?;
        let plaintext = document.open(&document_key, self.scheme)?;

        debug!(consent_id, domain, area, kid = %kid, "decrypted document");
        Ok(serde_json::from_slice(&plaintext)?)
    }

    /// The cached key map for the scope, with the document key recovered from
    /// an own entry. `None` if there is no map or no own entry unwraps.
    async fn reusable_key(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
    ) -> Result<Option<(DocumentKey, DocumentKeyMap)>> {
        let Some(map) = self.keys.get_document_keys(consent_id, domain, area).await? else {
            return Ok(None);
        };

        let own: Vec<String> = map
            .kids()
            .filter(|kid| self.keys.is_own_kid(kid))
            .map(String::from)
            .collect();

        for kid in &own {
            let Some(key) = self.keys.get_key(kid).await? else {
                continue;
            };
            let Some(wrapped) = map.wrapped_for(kid)? else {
                continue;
            };
            let recovered = key.rsa_private().map_err(KernelError::from).and_then(|private| {
                DocumentKey::unwrap_from(&wrapped, &private).map_err(KernelError::from)
            });
            match recovered {
                Ok(document_key) => {
                    debug!(consent_id, domain, area, kid = %kid, "reusing document key");
                    return Ok(Some((document_key, map)));
                }
                Err(error) => warn!(kid = %kid, %error, "cannot recover cached document key"),
            }
        }
        Ok(None)
    }

    /// A fresh document key wrapped for every reader of the scope.
    async fn mint(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
    ) -> Result<(DocumentKey, DocumentKeyMap)> {
        let readers = self.ledger.get_access_keys(consent_id, domain, area).await?;
        if readers.is_empty() {
            return Err(KernelError::Validation(format!(
                "no readers for {}|{}|{}",
                consent_id, domain, area
            )));
        }

        let publics = readers
            .iter()
            .map(|key| -> Result<_> { Ok((key.kid.as_str(), key.rsa_public()?)) })
            .collect::<Result<Vec<_>>>()?;

        let document_key = DocumentKey::generate();
        let keys = DocumentKeyMap::wrap_for(
            &document_key,
            publics.iter().map(|(kid, public)| (*kid, public)),
        )?;
        self.keys
            .save_document_keys(consent_id, domain, area, &keys)
            .await?;

        info!(consent_id, domain, area, readers = keys.len(), "minted document key");
        Ok((document_key, keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeyOptions;
    use consent_kernel_core::KeyUse;
    use consent_kernel_store::MemoryStore;
    use rsa::RsaPrivateKey;
    use serde_json::{json, Value};

    struct Party {
        keys: Arc<KeyProvider<MemoryStore>>,
        ledger: AccessLedger<MemoryStore>,
        cipher: DocumentCipher<MemoryStore>,
    }

    fn party(jwks: &str, scheme: BodyScheme) -> Party {
        let client = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let options = KeyOptions {
            modulus_length: 1024,
            ..KeyOptions::default()
        };
        let keys = Arc::new(
            KeyProvider::new(jwks, &client, options, Arc::new(MemoryStore::new())).unwrap(),
        );
        Party {
            ledger: AccessLedger::new(keys.clone()),
            cipher: DocumentCipher::new(keys.clone(), scheme),
            keys,
        }
    }

    async fn self_reader(p: &Party) -> String {
        let key = p.keys.generate_persistent_key(KeyUse::Enc).await.unwrap();
        let kid = key.kid.to_string();
        p.ledger
            .save_access_key_ids("c1", "d", "a", &[kid.clone()])
            .await
            .unwrap();
        p.ledger.save_consent_key_id("c1", &kid).await.unwrap();
        kid
    }

    #[tokio::test]
    async fn test_roundtrip() {
        let p = party("http://localhost:4000/jwks", BodyScheme::Aes256Cbc);
        self_reader(&p).await;

        let value = json!({"cats": ["Miso", "Tofu"], "count": 2});
        let envelope = p.cipher.encrypt("c1", "d", "a", &value).await.unwrap();
        assert_eq!(envelope.matches('\n').count(), 1);

        let back: Value = p.cipher.decrypt("c1", "d", "a", &envelope).await.unwrap();
        assert_eq!(back, value);
    }

    #[tokio::test]
    async fn test_roundtrip_with_aead_bodies() {
        let p = party("http://localhost:4000/jwks", BodyScheme::ChaCha20Poly1305);
        self_reader(&p).await;

        let envelope = p.cipher.encrypt("c1", "d", "a", "hello").await.unwrap();
        let back: String = p.cipher.decrypt("c1", "d", "a", &envelope).await.unwrap();
        assert_eq!(back, "hello");
    }

    #[tokio::test]
    async fn test_key_map_is_reused_until_readers_change() {
        let p = party("http://localhost:4000/jwks", BodyScheme::Aes256Cbc);
        let kid = self_reader(&p).await;

        let first = p.cipher.encrypt("c1", "d", "a", &1).await.unwrap();
        let second = p.cipher.encrypt("c1", "d", "a", &2).await.unwrap();
        let keys_of = |envelope: &str| envelope.split('\n').nth(1).unwrap().to_string();
        assert_eq!(keys_of(&first), keys_of(&second));
        // Same document key, fresh IV per write.
        assert_ne!(first.split('\n').next(), second.split('\n').next());

        p.ledger
            .save_access_key_ids("c1", "d", "a", &[kid])
            .await
            .unwrap();
        let third = p.cipher.encrypt("c1", "d", "a", &3).await.unwrap();
        assert_ne!(keys_of(&first), keys_of(&third));

        let back: i32 = p.cipher.decrypt("c1", "d", "a", &first).await.unwrap();
        assert_eq!(back, 1);
    }

    #[tokio::test]
    async fn test_excluded_reader_gets_no_matching_key() {
        let p = party("http://localhost:4000/jwks", BodyScheme::Aes256Cbc);
        let included = p.keys.generate_persistent_key(KeyUse::Enc).await.unwrap();
        let excluded = p.keys.generate_persistent_key(KeyUse::Enc).await.unwrap();

        p.ledger
            .save_access_key_ids("c1", "d", "a", &[included.kid.to_string()])
            .await
            .unwrap();
        p.ledger
            .save_consent_key_id("c1", excluded.kid.as_str())
            .await
            .unwrap();

        let envelope = p.cipher.encrypt("c1", "d", "a", &json!({"x": 1})).await.unwrap();
        let err = p
            .cipher
            .decrypt::<Value>("c1", "d", "a", &envelope)
            .await
            .unwrap_err();
        assert!(matches!(err, KernelError::NoMatchingKey(ref kid) if kid == excluded.kid.as_str()));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_decrypt_without_consent_key() {
        let p = party("http://localhost:4000/jwks", BodyScheme::Aes256Cbc);
        self_reader(&p).await;
        let envelope = p.cipher.encrypt("c1", "d", "a", &0).await.unwrap();

        assert!(matches!(
            p.cipher.decrypt::<i32>("c2", "d", "a", &envelope).await,
            Err(KernelError::NoConsentKey(_))
        ));
    }

    #[tokio::test]
    async fn test_encrypt_without_readers_fails() {
        let p = party("http://localhost:4000/jwks", BodyScheme::Aes256Cbc);
        assert!(matches!(
            p.cipher.encrypt("c1", "d", "a", &0).await,
            Err(KernelError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_peer_only_readers_mint_per_write() {
        let writer = party("http://writer/jwks", BodyScheme::Aes256Cbc);
        let reader = party("http://reader/jwks", BodyScheme::Aes256Cbc);

        let key = reader.keys.generate_persistent_key(KeyUse::Enc).await.unwrap();
        reader.ledger.save_consent_key_id("c1", key.kid.as_str()).await.unwrap();
        writer.keys.save_key(&key.public_only()).await.unwrap();
        writer
            .ledger
            .save_access_key_ids("c1", "d", "a", &[key.kid.to_string()])
            .await
            .unwrap();

        let first = writer.cipher.encrypt("c1", "d", "a", "one").await.unwrap();
        let second = writer.cipher.encrypt("c1", "d", "a", "two").await.unwrap();
        assert_ne!(first.split('\n').nth(1), second.split('\n').nth(1));

        let back: String = reader.cipher.decrypt("c1", "d", "a", &second).await.unwrap();
        assert_eq!(back, "two");
    }

    #[tokio::test]
    async fn test_malformed_envelope() {
        let p = party("http://localhost:4000/jwks", BodyScheme::Aes256Cbc);
        self_reader(&p).await;
        assert!(matches!(
            p.cipher.decrypt::<Value>("c1", "d", "a", "no-newline-here").await,
            Err(KernelError::Crypto(_))
        ));
    }
}

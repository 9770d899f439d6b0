//! The key provider: generation, persistence, promotion and lookup of keys.
//!
//! Every key except the client signing key lives in the store under
//! `key|>{kid}`. Temporary keys are saved with a TTL and disappear unless
//! [`KeyProvider::make_key_permanent`] re-saves them without one first.
//!
//! ## Kid resolution
//!
//! | input | resolves to |
//! |---|---|
//! | `client_key` | the in-memory client key |
//! | absolute URI | itself |
//! | anything else | `<jwks uri>/<input>` |

use std::sync::Arc;
use std::time::Duration;

use rsa::RsaPrivateKey;
use tracing::{debug, info};

use consent_kernel_core::{Jwk, Jwks, Key, KeyUse, Kid, KidRef, CLIENT_KEY};
use consent_kernel_perms::DocumentKeyMap;
use consent_kernel_store::{KeyValueStore, KeyValueStoreExt};

use crate::config::{KeyOptions, SUPPORTED_ALG};
use crate::error::{KernelError, Result};

const KEY_PREFIX: &str = "key|>";
const SIGNING_KEYS: &str = "signingKeys|>";
const DOCUMENT_KEYS_PREFIX: &str = "documentKeys|>";

/// `{consentId}|{domain}|{area}`.
pub(crate) fn scope_key(consent_id: &str, domain: &str, area: &str) -> String {
    [consent_id, domain, area].join("|")
}

fn key_entry(kid: &Kid) -> String {
    format!("{}{}", KEY_PREFIX, kid)
}

fn document_keys_entry(consent_id: &str, domain: &str, area: &str) -> String {
    format!("{}{}", DOCUMENT_KEYS_PREFIX, scope_key(consent_id, domain, area))
}

/// Owns the client key and every generated or ingested key.
pub struct KeyProvider<S: KeyValueStore> {
    jwks_uri: String,
    client_key: Key,
    options: KeyOptions,
    store: Arc<S>,
}

impl<S: KeyValueStore> KeyProvider<S> {
    /// Create a provider around the client's signing key.
    ///
    /// The client key gets the fixed kid `<jwks_uri>/client_key` and is never
    /// written to the store.
    pub fn new(
        jwks_uri: impl Into<String>,
        client_private: &RsaPrivateKey,
        options: KeyOptions,
        store: Arc<S>,
    ) -> Result<Self> {
        let jwks_uri = jwks_uri.into();
        let mut client_key =
            Key::from_private(&jwks_uri, KeyUse::Sig, client_private, Some(CLIENT_KEY))?;
        client_key.public_key = client_key.public_key.with_metadata(
            client_key.kid.as_str(),
            KeyUse::Sig,
            Some(SUPPORTED_ALG),
        );

        Ok(Self {
            jwks_uri,
            client_key,
            options,
            store,
        })
    }

    /// Base URI of this client's key set.
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// The client signing key.
    pub fn client_key(&self) -> &Key {
        &self.client_key
    }

    /// Key generation options.
    pub fn options(&self) -> &KeyOptions {
        &self.options
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Resolve a raw kid against this provider's key set.
    pub fn resolve_kid(&self, kid: &str) -> KidRef {
        Kid::resolve(kid, &self.jwks_uri)
    }

    /// Whether `kid` names a key in this client's own key set.
    pub fn is_own_kid(&self, kid: &str) -> bool {
        Kid::new(kid).is_under(&self.jwks_uri)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookup
    // ─────────────────────────────────────────────────────────────────────────

    /// Look up a key. Absence is `Ok(None)`.
    pub async fn get_key(&self, kid: &str) -> Result<Option<Key>> {
        match self.resolve_kid(kid) {
            KidRef::ClientKey => Ok(Some(self.client_key.clone())),
            KidRef::Stored(kid) => Ok(self.store.load_json(&key_entry(&kid)).await?),
        }
    }

    /// Look up a key that must exist.
    pub async fn require_key(&self, kid: &str) -> Result<Key> {
        self.get_key(kid)
            .await?
            .ok_or_else(|| KernelError::KeyNotFound(kid.to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Generation
    // ─────────────────────────────────────────────────────────────────────────

    /// Generate and persist a key with no expiry.
    pub async fn generate_persistent_key(&self, key_use: KeyUse) -> Result<Key> {
        self.generate(key_use, None, None).await
    }

    /// Like [`generate_persistent_key`](Self::generate_persistent_key) with a caller-chosen kid.
    pub async fn generate_persistent_key_with_kid(&self, key_use: KeyUse, kid: &str) -> Result<Key> {
        self.generate(key_use, None, Some(kid)).await
    }

    /// Generate and persist a key that expires after the configured TTL.
    pub async fn generate_temporary_key(&self, key_use: KeyUse) -> Result<Key> {
        self.generate(key_use, Some(self.options.temp_key_ttl()), None)
            .await
    }

    /// Like [`generate_temporary_key`](Self::generate_temporary_key) with a caller-chosen kid.
    pub async fn generate_temporary_key_with_kid(&self, key_use: KeyUse, kid: &str) -> Result<Key> {
        self.generate(key_use, Some(self.options.temp_key_ttl()), Some(kid))
            .await
    }

    async fn generate(
        &self,
        key_use: KeyUse,
        ttl: Option<Duration>,
        explicit_kid: Option<&str>,
    ) -> Result<Key> {
        if let Some(kid) = explicit_kid {
            if self.resolve_kid(kid) == KidRef::ClientKey {
                return Err(KernelError::Validation(
                    "client_key is reserved for the client signing key".into(),
                ));
            }
        }

        let jwks_uri = self.jwks_uri.clone();
        let bits = self.options.modulus_length;
        let explicit_kid = explicit_kid.map(String::from);
        let key = tokio::task::spawn_blocking(move || {
            Key::generate(&jwks_uri, key_use, bits, explicit_kid.as_deref())
        })
        .await
        .map_err(|e| KernelError::Crypto(format!("key generation task failed: {}", e)))??;

        self.store.save_json(&key_entry(&key.kid), &key, ttl).await?;

        match ttl {
            Some(ttl) => info!(
                kid = %key.kid,
                key_use = key_use.as_str(),
                ttl_ms = ttl.as_millis() as u64,
                "generated temporary key"
            ),
            None => {
                if key_use == KeyUse::Sig {
                    self.index_signing_key(&key.kid).await?;
                }
                info!(kid = %key.kid, key_use = key_use.as_str(), "generated persistent key");
            }
        }
        Ok(key)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Persistence
    // ─────────────────────────────────────────────────────────────────────────

    /// Re-save a key without TTL so it no longer expires.
    ///
    /// Fails with [`KernelError::KeyNotFound`] if the key is gone. Calling it
    /// again on a permanent key is a no-op.
    pub async fn make_key_permanent(&self, kid: &str) -> Result<()> {
        let kid = match self.resolve_kid(kid) {
            KidRef::ClientKey => return Ok(()),
            KidRef::Stored(kid) => kid,
        };

        let entry = key_entry(&kid);
        let key: Key = self
            .store
            .load_json(&entry)
            .await?
            .ok_or_else(|| KernelError::KeyNotFound(kid.to_string()))?;
        self.store.save_json(&entry, &key, None).await?;

        info!(kid = %kid, "made key permanent");
        Ok(())
    }

    /// Persist a key with no expiry, e.g. a peer's public key.
    pub async fn save_key(&self, key: &Key) -> Result<()> {
        if self.resolve_kid(key.kid.as_str()) == KidRef::ClientKey {
            return Err(KernelError::Validation(
                "the client key cannot be overwritten".into(),
            ));
        }
        self.store.save_json(&key_entry(&key.kid), key, None).await?;
        debug!(kid = %key.kid, own = key.is_own(), "saved key");
        Ok(())
    }

    /// Remove a key. Removing an absent key is not an error.
    pub async fn remove_key(&self, kid: &str) -> Result<()> {
        let kid = match self.resolve_kid(kid) {
            KidRef::ClientKey => {
                return Err(KernelError::Validation(
                    "the client key cannot be removed".into(),
                ))
            }
            KidRef::Stored(kid) => kid,
        };

        self.store.remove(&key_entry(&kid)).await?;
        self.unindex_signing_key(&kid).await?;
        info!(kid = %kid, "removed key");
        Ok(())
    }

    async fn signing_kids(&self) -> Result<Vec<Kid>> {
        Ok(self
            .store
            .load_json::<Vec<Kid>>(SIGNING_KEYS)
            .await?
            .unwrap_or_default())
    }

    async fn index_signing_key(&self, kid: &Kid) -> Result<()> {
        let mut kids = self.signing_kids().await?;
        if !kids.contains(kid) {
            kids.push(kid.clone());
            self.store.save_json(SIGNING_KEYS, &kids, None).await?;
        }
        Ok(())
    }

    async fn unindex_signing_key(&self, kid: &Kid) -> Result<()> {
        let mut kids = self.signing_kids().await?;
        let before = kids.len();
        kids.retain(|k| k != kid);
        if kids.len() != before {
            self.store.save_json(SIGNING_KEYS, &kids, None).await?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Document key maps
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist the wrapped document keys for a scope.
    pub async fn save_document_keys(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
        keys: &DocumentKeyMap,
    ) -> Result<()> {
        self.store
            .save_json(&document_keys_entry(consent_id, domain, area), keys, None)
            .await?;
        Ok(())
    }

    /// The wrapped document keys for a scope, if any.
    pub async fn get_document_keys(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
    ) -> Result<Option<DocumentKeyMap>> {
        Ok(self
            .store
            .load_json(&document_keys_entry(consent_id, domain, area))
            .await?)
    }

    /// Drop the wrapped document keys for a scope.
    pub async fn remove_document_keys(&self, consent_id: &str, domain: &str, area: &str) -> Result<()> {
        self.store
            .remove(&document_keys_entry(consent_id, domain, area))
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // JWKS
    // ─────────────────────────────────────────────────────────────────────────

    /// Public key set: the client key, then every persistent signing key.
    pub async fn jwks_key_list(&self) -> Result<Jwks> {
        let mut keys = vec![self.client_key.to_jwk()];
        for kid in self.signing_kids().await? {
            if let Some(key) = self.get_key(kid.as_str()).await? {
                keys.push(key.to_jwk());
            }
        }
        Ok(Jwks::new(keys))
    }

    /// Public half of one key.
    pub async fn jwks_key(&self, kid: &str) -> Result<Option<Jwk>> {
        Ok(self.get_key(kid).await?.map(|key| key.to_jwk()))
    }
}

//! Access control ledger.
//!
//! Records who may read documents in a `(consent, domain, area)` scope, who
//! must be able to read what this client writes into a `(domain, area)`,
//! and which of this client's own keys belongs to each consent.

use std::sync::Arc;

use tracing::{debug, info};

use consent_kernel_core::{Jwks, Key};
use consent_kernel_store::{KeyValueStore, KeyValueStoreExt};

use crate::error::{KernelError, Result};
use crate::keys::{scope_key, KeyProvider};

const ACCESS_KEY_IDS_PREFIX: &str = "accessKeyIds|>";
const WRITE_KEYS_PREFIX: &str = "writeKeys|>";
const CONSENT_KEY_ID_PREFIX: &str = "consentKeyId|>";
const PERMISSION_ID_PREFIX: &str = "permissionId|>";

fn area_key(domain: &str, area: &str) -> String {
    [domain, area].join("|")
}

/// Access lists and write key sets, backed by the provider's store.
pub struct AccessLedger<S: KeyValueStore> {
    keys: Arc<KeyProvider<S>>,
}

impl<S: KeyValueStore> Clone for AccessLedger<S> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
        }
    }
}

impl<S: KeyValueStore> AccessLedger<S> {
    /// Create a ledger over `keys`.
    pub fn new(keys: Arc<KeyProvider<S>>) -> Self {
        Self { keys }
    }

    fn store(&self) -> &S {
        self.keys.store()
    }

    /// Replace the readers of a scope.
    ///
    /// Any cached document key map for the scope is dropped, so the next
    /// write wraps a fresh document key for the new reader set.
    pub async fn save_access_key_ids(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
        kids: &[String],
    ) -> Result<()> {
        let entry = format!("{}{}", ACCESS_KEY_IDS_PREFIX, scope_key(consent_id, domain, area));
        self.store().save_json(&entry, kids, None).await?;
        self.keys.remove_document_keys(consent_id, domain, area).await?;

        info!(consent_id, domain, area, readers = kids.len(), "saved access key ids");
        Ok(())
    }

    /// The readers of a scope, in the order they were saved. Empty if unset.
    pub async fn get_access_key_ids(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
    ) -> Result<Vec<String>> {
        let entry = format!("{}{}", ACCESS_KEY_IDS_PREFIX, scope_key(consent_id, domain, area));
        Ok(self
            .store()
            .load_json::<Vec<String>>(&entry)
            .await?
            .unwrap_or_default())
    }

    /// Resolve every reader of a scope to its key, preserving order.
    ///
    /// A kid that no longer resolves fails the whole call with
    /// [`KernelError::KeyNotFound`] rather than shrinking the list.
    pub async fn get_access_keys(
        &self,
        consent_id: &str,
        domain: &str,
        area: &str,
    ) -> Result<Vec<Key>> {
        let kids = self.get_access_key_ids(consent_id, domain, area).await?;
        let mut keys = Vec::with_capacity(kids.len());
        for kid in &kids {
            keys.push(self.keys.require_key(kid).await?);
        }
        Ok(keys)
    }

    /// Record the public keys that must be able to read what this client
    /// writes into `(domain, area)`. Returns the saved set.
    pub async fn save_write_keys(&self, domain: &str, area: &str, jwks: Jwks) -> Result<Jwks> {
        let entry = format!("{}{}", WRITE_KEYS_PREFIX, area_key(domain, area));
        self.store().save_json(&entry, &jwks, None).await?;

        debug!(domain, area, keys = jwks.keys.len(), "saved write keys");
        Ok(jwks)
    }

    /// The write key set for `(domain, area)`, if any.
    pub async fn get_write_keys(&self, domain: &str, area: &str) -> Result<Option<Jwks>> {
        let entry = format!("{}{}", WRITE_KEYS_PREFIX, area_key(domain, area));
        Ok(self.store().load_json(&entry).await?)
    }

    /// Record which own key reads documents under `consent_id`.
    pub async fn save_consent_key_id(&self, consent_id: &str, kid: &str) -> Result<()> {
        let entry = format!("{}{}", CONSENT_KEY_ID_PREFIX, consent_id);
        self.store().save_json(&entry, kid, None).await?;
        debug!(consent_id, kid, "saved consent key id");
        Ok(())
    }

    /// The own key id for `consent_id`.
    ///
    /// Fails with [`KernelError::NoConsentKey`] if none was recorded.
    pub async fn get_consent_key_id(&self, consent_id: &str) -> Result<String> {
        let entry = format!("{}{}", CONSENT_KEY_ID_PREFIX, consent_id);
        self.store()
            .load_json::<String>(&entry)
            .await?
            .ok_or_else(|| KernelError::NoConsentKey(consent_id.to_string()))
    }

    /// Record the approved permission id for `(domain, area)`.
    pub async fn save_permission_id(&self, domain: &str, area: &str, id: &str) -> Result<()> {
        let entry = format!("{}{}", PERMISSION_ID_PREFIX, area_key(domain, area));
        self.store().save_json(&entry, id, None).await?;
        Ok(())
    }

    /// The approved permission id for `(domain, area)`, if any.
    pub async fn get_permission_id(&self, domain: &str, area: &str) -> Result<Option<String>> {
        let entry = format!("{}{}", PERMISSION_ID_PREFIX, area_key(domain, area));
        Ok(self.store().load_json(&entry).await?)
    }
}

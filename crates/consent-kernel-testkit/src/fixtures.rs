//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::OnceLock;

use rsa::RsaPrivateKey;

use consent_kernel::{Client, ClientConfig, KeyOptions, Result};
use consent_kernel_core::{Key, KeyUse};
use consent_kernel_operator::MemoryTransport;
use consent_kernel_store::{KeyValueStore, MemoryStore};

/// Lifetime of temporary keys minted by fixtures.
pub const TEMP_KEY_EXPIRY_MS: u64 = 60_000;

/// Modulus length of keys minted by fixtures.
pub const FIXTURE_MODULUS_BITS: usize = 1024;

/// A process-wide 2048-bit client key. RS256 refuses anything smaller.
pub fn client_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("generate client key")
    })
}

/// A valid configuration for `client_id` with short-lived, small keys.
pub fn test_config(client_id: &str) -> ClientConfig {
    let mut config = ClientConfig::new(
        client_id,
        "http://operator.test",
        "Test service",
        "A service used in tests",
    );
    config.key_options = KeyOptions {
        temp_key_expiry_ms: TEMP_KEY_EXPIRY_MS,
        modulus_length: FIXTURE_MODULUS_BITS,
    };
    config
}

/// A test fixture with a client over a given store.
pub struct TestFixture<S: KeyValueStore = MemoryStore> {
    pub client: Client<S, MemoryTransport>,
}

impl TestFixture<MemoryStore> {
    /// Create a fixture for `client_id` backed by a memory store.
    pub fn new(client_id: &str) -> Self {
        Self::with_store(client_id, MemoryStore::new())
    }
}

impl<S: KeyValueStore + 'static> TestFixture<S> {
    /// Create a fixture for `client_id` backed by `store`.
    pub fn with_store(client_id: &str, store: S) -> Self {
        Self::with_config(test_config(client_id), store)
    }

    /// Create a fixture from a full configuration.
    pub fn with_config(config: ClientConfig, store: S) -> Self {
        let client = Client::new(config, client_key(), store, MemoryTransport::new())
            .expect("fixture config is valid");
        Self { client }
    }

    /// This party's JWKS URI.
    pub fn jwks_uri(&self) -> String {
        self.client.config().jwks_uri()
    }

    /// Mint a persistent encryption key this party can read with.
    pub async fn reader_key(&self) -> Result<Key> {
        self.client.keys().generate_persistent_key(KeyUse::Enc).await
    }

    /// Learn the public half of `key`.
    pub async fn learn(&self, key: &Key) -> Result<()> {
        self.client.keys().save_key(&key.public_only()).await
    }

    /// Authorize `kids` to read the scope.
    pub async fn grant(&self, consent_id: &str, domain: &str, area: &str, kids: &[&Key]) -> Result<()> {
        let kids: Vec<String> = kids.iter().map(|key| key.kid.to_string()).collect();
        self.client
            .ledger()
            .save_access_key_ids(consent_id, domain, area, &kids)
            .await
    }

    /// Decrypt documents of `consent_id` with `key`.
    pub async fn read_with(&self, consent_id: &str, key: &Key) -> Result<()> {
        self.client
            .ledger()
            .save_consent_key_id(consent_id, key.kid.as_str())
            .await
    }
}

/// Create fixtures for `count` distinct parties.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| TestFixture::new(&format!("http://party-{}.test", i)))
        .collect()
}

//! Proptest generators for property-based testing.

use std::sync::OnceLock;

use proptest::prelude::*;
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

use consent_kernel_core::KeyUse;

use crate::fixtures::FIXTURE_MODULUS_BITS;

const POOL_SIZE: usize = 4;

/// A small pool of RSA keys. Generating one per case would dominate runtime.
fn key_pool() -> &'static [RsaPrivateKey] {
    static POOL: OnceLock<Vec<RsaPrivateKey>> = OnceLock::new();
    POOL.get_or_init(|| {
        (0..POOL_SIZE)
            .map(|_| {
                RsaPrivateKey::new(&mut rand::thread_rng(), FIXTURE_MODULUS_BITS)
                    .expect("generate pool key")
            })
            .collect()
    })
}

/// Pick an RSA key from the pool.
pub fn rsa_key() -> impl Strategy<Value = RsaPrivateKey> {
    (0..POOL_SIZE).prop_map(|i| key_pool()[i].clone())
}

/// Generate a key use.
pub fn key_use() -> impl Strategy<Value = KeyUse> {
    prop_oneof![Just(KeyUse::Sig), Just(KeyUse::Enc)]
}

/// Generate a JWKS URI.
pub fn jwks_base() -> impl Strategy<Value = String> {
    "(http|https)://[a-z][a-z0-9]{0,11}\\.test(/[a-z]{1,8})?/jwks"
}

/// Generate a relative key name.
pub fn key_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}".prop_filter("reserved for the client key", |name| name != "client_key")
}

/// Generate a consent id.
pub fn consent_id() -> impl Strategy<Value = String> {
    "[a-f0-9]{8}-[a-f0-9]{4}"
}

/// Generate an area name.
pub fn area() -> impl Strategy<Value = String> {
    "[a-z][a-z_]{0,23}"
}

/// Generate a JSON document: an object of strings, numbers and lists.
pub fn document() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        any::<i64>().prop_map(Value::from),
        any::<bool>().prop_map(Value::from),
        "[ -~]{0,32}".prop_map(Value::from),
        Just(Value::Null),
    ];
    let field = prop_oneof![
        leaf.clone(),
        prop::collection::vec(leaf, 0..4).prop_map(Value::from),
    ];
    prop::collection::btree_map("[a-z]{1,8}", field, 0..6).prop_map(|fields| json!(fields))
}

/// Parameters for sealing one document.
#[derive(Debug, Clone)]
pub struct ScopeParams {
    pub consent_id: String,
    pub domain: String,
    pub area: String,
    pub document: Value,
}

impl Arbitrary for ScopeParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            consent_id(),
            "https://[a-z]{1,8}\\.test",
            area(),
            document(),
        )
            .prop_map(|(consent_id, domain, area, document)| ScopeParams {
                consent_id,
                domain,
                area,
                document,
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_kernel_core::Key;

    proptest! {
        #[test]
        fn test_kid_is_deterministic(base in jwks_base(), key_use in key_use(), private in rsa_key()) {
            let k1 = Key::from_private(&base, key_use, &private, None).unwrap();
            let k2 = Key::from_private(&base, key_use, &private, None).unwrap();

            prop_assert_eq!(&k1.kid, &k2.kid);
            let expected = format!("{}/{}_{}", base, key_use.as_str(), k1.thumbprint());
            prop_assert_eq!(k1.kid.as_str(), expected.as_str());
        }

        #[test]
        fn test_explicit_kid_is_prefixed(base in jwks_base(), name in key_name(), private in rsa_key()) {
            let key = Key::from_private(&base, KeyUse::Enc, &private, Some(&name)).unwrap();
            let expected = format!("{}/{}", base, name);
            prop_assert_eq!(key.kid.as_str(), expected.as_str());
            prop_assert!(key.kid.is_under(&base));
        }

        #[test]
        fn test_documents_serialize(params: ScopeParams) {
            let bytes = serde_json::to_vec(&params.document).unwrap();
            let back: Value = serde_json::from_slice(&bytes).unwrap();
            prop_assert_eq!(back, params.document);
        }
    }
}

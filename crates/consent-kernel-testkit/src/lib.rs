//! # Consent Kernel Testkit
//!
//! Testing utilities for the Consent Kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Known thumbprints and kids for cross-platform verification
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Clients with small keys and a shared signing key
//!
//! ## Golden Vectors
//!
//! Kids are derived from RFC 7638 thumbprints:
//!
//! ```rust
//! use consent_kernel_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, kid) in verify_all_vectors() {
//!     assert!(matches, "{}: {}", name, kid);
//! }
//! ```
//!
//! ## Property Testing
//!
//! Use the generators with proptest:
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use consent_kernel_testkit::generators::{jwks_base, rsa_key};
//! use consent_kernel::{Key, KeyUse};
//!
//! proptest! {
//!     #[test]
//!     fn kid_is_deterministic(base in jwks_base(), private in rsa_key()) {
//!         let k1 = Key::from_private(&base, KeyUse::Enc, &private, None).unwrap();
//!         let k2 = Key::from_private(&base, KeyUse::Enc, &private, None).unwrap();
//!         prop_assert_eq!(k1.kid, k2.kid);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! Quickly set up test scenarios:
//!
//! ```rust,no_run
//! use consent_kernel_testkit::fixtures::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new("http://cats.test");
//!     let key = fixture.reader_key().await.unwrap();
//!     fixture.grant("c1", "http://cats.test", "favorite_cats", &[&key]).await.unwrap();
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{client_key, multi_party_fixtures, test_config, TestFixture};
pub use generators::{document, rsa_key, ScopeParams};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};

//! # Consent Kernel Core
//!
//! Pure primitives for the consent kernel: key identifiers, JSON Web Keys,
//! RSA key pairs and RFC 7638 thumbprints.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over key material.
//!
//! ## Key Types
//!
//! - [`Kid`] - URI-shaped key identifier, resolved against a JWKS base
//! - [`Jwk`] / [`Jwks`] - JSON Web Key (set) serialization
//! - [`Key`] - A key record: public half plus, for own keys, the private half
//! - [`KeyUse`] - `sig` or `enc`
//!
//! ## Key Identifiers
//!
//! Generated keys are named `<jwks base>/<use>_<thumbprint>`, where the
//! thumbprint is the base64url SHA-256 of the canonical `{e, kty, n}` JSON.
//! The same public key always yields the same identifier. See [`thumbprint`].

pub mod error;
pub mod jwk;
pub mod key;
pub mod kid;
pub mod thumbprint;

pub use error::{CoreError, Result};
pub use jwk::{Jwk, Jwks, KeyUse};
pub use key::Key;
pub use kid::{is_absolute_uri, Kid, KidRef, CLIENT_KEY};
pub use thumbprint::thumbprint;

//! # Consent Kernel
//!
//! Client-side key lifecycle and access-controlled document encryption for
//! services taking part in a consent protocol.
//!
//! ## Overview
//!
//! The Consent Kernel provides:
//!
//! - **Keys**: RSA key pairs addressed by URI kids, temporary until a
//!   handshake completes and permanent afterwards
//! - **Access ledger**: which kids may read a scope, who may write it, and
//!   which own key opens documents of a consent
//! - **Documents**: JSON values sealed with a random document key that is
//!   wrapped once per reader
//! - **Handshakes**: operator registration, authentication, connections and
//!   consent approvals
//!
//! ## Key Concepts
//!
//! - **Kid**: `<jwks_uri>/<id>`. Kids under this client's JWKS URI are own keys.
//! - **Scope**: `(consent_id, domain, area)`. Each scope has its own readers.
//! - **Temporary key**: expires unless a handshake makes it permanent.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consent_kernel::{Client, ClientConfig};
//! use consent_kernel::operator::MemoryTransport;
//! use consent_kernel::store::SqliteStore;
//! use rsa::RsaPrivateKey;
//!
//! async fn example() -> consent_kernel::Result<()> {
//!     let config = ClientConfig::new(
//!         "https://cats.example",
//!         "https://operator.example",
//!         "Cats",
//!         "A service that knows cats",
//!     );
//!     let client_key = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
//!     let store = SqliteStore::open("keys.db")?;
//!
//!     let client = Client::new(config, &client_key, store, MemoryTransport::new())?;
//!     client.connect().await?;
//!
//!     let envelope = client
//!         .documents()
//!         .encrypt("consent-1", "https://cats.example", "favorite_cats", &["Miso"])
//!         .await?;
//!     let cats: Vec<String> = client
//!         .documents()
//!         .decrypt("consent-1", "https://cats.example", "favorite_cats", &envelope)
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `consent_kernel::core` - Keys, kids and JWKs
//! - `consent_kernel::store` - Storage abstraction, memory and SQLite
//! - `consent_kernel::perms` - Permissions and document encryption
//! - `consent_kernel::operator` - Handshake messages and transport

pub mod client;
pub mod config;
pub mod connection;
pub mod consents;
pub mod document;
pub mod error;
pub mod keys;
pub mod ledger;
pub mod tokens;

// Re-export component crates
pub use consent_kernel_core as core;
pub use consent_kernel_operator as operator;
pub use consent_kernel_perms as perms;
pub use consent_kernel_store as store;

// Re-export main types for convenience
pub use client::{AuthenticationInit, Client, ConsentRequested, EventResponse};
pub use config::{ClientConfig, KeyOptions};
pub use connection::{ConnectionHandler, Session, SessionState};
pub use consents::{ConsentHandler, SignedConsentRequest};
pub use document::DocumentCipher;
pub use error::{KernelError, Result};
pub use keys::KeyProvider;
pub use ledger::AccessLedger;
pub use tokens::{JwtTokenService, TokenHeader, TokenService, VerifiedToken};

// Re-export commonly used component types
pub use consent_kernel_core::{Jwk, Jwks, Key, KeyUse, Kid};
pub use consent_kernel_perms::BodyScheme;

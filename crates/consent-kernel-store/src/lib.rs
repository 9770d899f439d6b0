//! # Consent Kernel Store
//!
//! Storage abstraction for the consent kernel. Everything the kernel persists
//! (keys, access lists, document-key maps, session state) goes through the
//! [`KeyValueStore`] trait as namespaced string keys and opaque byte values.
//!
//! ## Key Types
//!
//! - [`KeyValueStore`] - The async trait: `save` with optional TTL, `load`, `remove`
//! - [`KeyValueStoreExt`] - JSON helpers using the `base64(JSON)` value encoding
//! - [`MemoryStore`] - In-memory store with timer-driven eviction
//! - [`SqliteStore`] - SQLite-based persistent storage
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use bytes::Bytes;
//! use consent_kernel_store::{KeyValueStore, MemoryStore};
//!
//! async fn example() {
//!     let store = MemoryStore::new();
//!
//!     // Saved with a TTL: gone after ten minutes unless saved again.
//!     store
//!         .save("key|>http://localhost/jwks/enc_x", Bytes::from_static(b"..."), Some(Duration::from_secs(600)))
//!         .await
//!         .unwrap();
//!
//!     // Saved again without TTL: the pending expiry is cancelled.
//!     store
//!         .save("key|>http://localhost/jwks/enc_x", Bytes::from_static(b"..."), None)
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Expiry semantics
//!
//! - A save with a TTL replaces any earlier deadline for the key.
//! - A save without a TTL clears any pending deadline.
//! - A load never returns an entry whose deadline has passed, even if the
//!   eviction itself has not run yet.

pub mod codec;
pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use codec::{decode_value, encode_value};
pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{KeyValueStore, KeyValueStoreExt};

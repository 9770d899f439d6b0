//! # Consent Kernel Permissions
//!
//! Access-controlled document encryption and the permission data model.
//!
//! ## Encryption Model
//!
//! Documents use a two-layer key model:
//!
//! 1. **Document Key**: a random 256-bit symmetric key that encrypts the body
//! 2. **Wrapped Keys**: the document key, RSA-OAEP encrypted once per recipient
//!
//! Adding or removing a recipient only changes the wrapped-key map, never the
//! body. Revocation means not wrapping for a kid on the next write.
//!
//! ## Key Types
//!
//! - [`DocumentKey`] - symmetric key with body encryption and RSA wrapping
//! - [`EncryptedDocument`] - the two-segment `body \n keys` envelope
//! - [`DocumentKeyMap`] - wrapped document keys by kid
//! - [`Permission`] / [`ApprovedPermission`] - requested and granted rows
//! - [`ConsentRequestDescription`] / [`ConsentApproval`] - consent payloads
//!
//! ## Usage
//!
//! ```rust,no_run
//! use consent_kernel_perms::{BodyScheme, DocumentKey, DocumentKeyMap, EncryptedDocument};
//!
//! # fn example(recipient: &rsa::RsaPublicKey) -> consent_kernel_perms::Result<()> {
//! let key = DocumentKey::generate();
//! let keys = DocumentKeyMap::wrap_for(&key, [("http://localhost/jwks/enc_x", recipient)])?;
//! let wire = EncryptedDocument::seal(b"{}", &key, keys, BodyScheme::Aes256Cbc)?.to_wire()?;
//! # Ok(())
//! # }
//! ```

pub mod consent;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod permission;

pub use consent::{ApprovedScope, ConsentApproval, ConsentRequestDescription, ScopeEntry};
pub use crypto::{BodyScheme, DocumentKey, DOCUMENT_KEY_LEN, IV_LEN, NONCE_LEN};
pub use envelope::{DocumentKeyMap, EncryptedDocument};
pub use error::{PermsError, Result};
pub use permission::{
    ApprovedPermission, ApprovedPermissions, DefaultPermission, LawfulBasis, Permission,
    PermissionType,
};

//! RFC 7638 JWK thumbprints.
//!
//! The thumbprint covers only the required public members `{e, kty, n}`,
//! serialized with lexicographically ordered keys and no whitespace. Key use,
//! algorithm and identifier never influence the result.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::jwk::Jwk;

/// Members in lexicographic order; serde_json keeps declaration order.
#[derive(Serialize)]
struct ThumbprintMembers<'a> {
    e: &'a str,
    kty: &'a str,
    n: &'a str,
}

/// The canonical JSON the thumbprint is computed over.
pub fn canonical_members(jwk: &Jwk) -> String {
    let members = ThumbprintMembers {
        e: &jwk.e,
        kty: &jwk.kty,
        n: &jwk.n,
    };
    // Serializing three string fields cannot fail.
    serde_json::to_string(&members).unwrap_or_default()
}

/// base64url(SHA-256(canonical `{e, kty, n}`)).
pub fn thumbprint(jwk: &Jwk) -> String {
    let digest = Sha256::digest(canonical_members(jwk).as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

//! Golden test vectors for deterministic verification.
//!
//! Key identifiers are derived from RFC 7638 thumbprints, so every
//! implementation must agree on the thumbprint of a given public key.

use consent_kernel_core::{thumbprint, Jwk, Kid, KeyUse};

/// Modulus of the example key in RFC 7638 §3.1.
pub const RFC7638_N: &str = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";

/// Thumbprint of the RFC 7638 §3.1 example key.
pub const RFC7638_THUMBPRINT: &str = "NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs";

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// JWKS URI the key is minted under.
    pub jwks_base: &'static str,
    /// Key use.
    pub key_use: KeyUse,
    /// Optional `kid` value on the JWK, which must not affect the thumbprint.
    pub jwk_kid: Option<&'static str>,
    /// Modulus (base64url).
    pub n: &'static str,
    /// Exponent (base64url).
    pub e: &'static str,
    /// Expected thumbprint.
    pub expected_thumbprint: &'static str,
    /// Expected generated kid.
    pub expected_kid: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "RFC 7638 example, encryption key",
            jwks_base: "https://cats.example/jwks",
            key_use: KeyUse::Enc,
            jwk_kid: Some("2011-04-29"),
            n: RFC7638_N,
            e: "AQAB",
            expected_thumbprint: RFC7638_THUMBPRINT,
            expected_kid: "https://cats.example/jwks/enc_NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs",
        },
        GoldenVector {
            name: "RFC 7638 example, signing key",
            jwks_base: "https://cats.example/jwks",
            key_use: KeyUse::Sig,
            jwk_kid: None,
            n: RFC7638_N,
            e: "AQAB",
            expected_thumbprint: RFC7638_THUMBPRINT,
            expected_kid: "https://cats.example/jwks/sig_NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs",
        },
        GoldenVector {
            name: "trailing slash on the JWKS URI",
            jwks_base: "http://localhost:4000/jwks/",
            key_use: KeyUse::Enc,
            jwk_kid: None,
            n: RFC7638_N,
            e: "AQAB",
            expected_thumbprint: RFC7638_THUMBPRINT,
            expected_kid: "http://localhost:4000/jwks/enc_NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs",
        },
    ]
}

/// The public JWK described by a vector.
pub fn jwk_from_vector(vector: &GoldenVector) -> Jwk {
    Jwk {
        kty: "RSA".to_string(),
        kid: vector.jwk_kid.map(String::from),
        key_use: Some(vector.key_use),
        alg: None,
        n: vector.n.to_string(),
        e: vector.e.to_string(),
        d: None,
        p: None,
        q: None,
    }
}

/// The kid a generated key with this material gets.
pub fn kid_from_vector(vector: &GoldenVector) -> Kid {
    let jwk = jwk_from_vector(vector);
    Kid::under(
        vector.jwks_base,
        &format!("{}_{}", vector.key_use.as_str(), thumbprint(&jwk)),
    )
}

/// Check every vector: `(name, matches, actual kid)`.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let actual = thumbprint(&jwk_from_vector(v));
            let kid = kid_from_vector(v);
            let matches = actual == v.expected_thumbprint && kid.as_str() == v.expected_kid;
            (v.name.to_string(), matches, kid.into_string())
        })
        .collect()
}

//! Key identifiers.
//!
//! A `kid` is a URI naming a key inside a JWKS namespace. Identifiers coming
//! off the wire may be relative (`enc_abc`), the literal `client_key`, or an
//! absolute URI. [`Kid::resolve`] turns any of these into a [`KidRef`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Suffix of the distinguished client signing key.
pub const CLIENT_KEY: &str = "client_key";

/// A key identifier (always absolute once constructed through this crate).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kid(String);

/// Outcome of resolving a raw identifier against a JWKS base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KidRef {
    /// The literal `client_key` (or its absolute form).
    ClientKey,
    /// Any other key, as an absolute identifier.
    Stored(Kid),
}

impl Kid {
    /// Wrap an identifier verbatim.
    pub fn new(kid: impl Into<String>) -> Self {
        Self(kid.into())
    }

    /// Join a JWKS base URI and a suffix: `<base>/<suffix>`.
    pub fn under(jwks_base: &str, suffix: &str) -> Self {
        Self(format!("{}/{}", jwks_base.trim_end_matches('/'), suffix))
    }

    /// Name an explicit identifier: kept as-is when absolute, otherwise
    /// prefixed with the JWKS base.
    pub fn named(jwks_base: &str, kid: &str) -> Self {
        if is_absolute_uri(kid) {
            Self(kid.to_string())
        } else {
            Self::under(jwks_base, kid)
        }
    }

    /// The identifier of the client signing key for a JWKS base.
    pub fn client_key(jwks_base: &str) -> Self {
        Self::under(jwks_base, CLIENT_KEY)
    }

    /// Resolve a raw identifier.
    ///
    /// `client_key` maps to the client key, an absolute URI is used as-is,
    /// anything else is prefixed with `jwks_base`.
    pub fn resolve(raw: &str, jwks_base: &str) -> KidRef {
        if raw == CLIENT_KEY {
            return KidRef::ClientKey;
        }
        let kid = Self::named(jwks_base, raw);
        if kid == Self::client_key(jwks_base) {
            KidRef::ClientKey
        } else {
            KidRef::Stored(kid)
        }
    }

    /// Whether this identifier lives under the given JWKS base.
    pub fn is_under(&self, jwks_base: &str) -> bool {
        let base = jwks_base.trim_end_matches('/');
        self.0
            .strip_prefix(base)
            .map(|rest| rest.starts_with('/'))
            .unwrap_or(false)
    }

    /// Borrow as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for Kid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Kid({})", self.0)
    }
}

impl fmt::Display for Kid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Kid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Kid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Kid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Check whether `s` is an absolute URI (RFC 3986 scheme followed by `:`).
pub fn is_absolute_uri(s: &str) -> bool {
    let Some((scheme, rest)) = s.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    let starts_alpha = chars.next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false);
    starts_alpha
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        && !rest.is_empty()
        && !s.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:4000/jwks";

    #[test]
    fn test_absolute_uri_detection() {
        assert!(is_absolute_uri("http://localhost:4000/jwks/abc"));
        assert!(is_absolute_uri("https://foobar/jwks/abc"));
        assert!(is_absolute_uri("urn:example:key"));
        assert!(!is_absolute_uri("abc"));
        assert!(!is_absolute_uri("enc_abc"));
        assert!(!is_absolute_uri("1http://x"));
        assert!(!is_absolute_uri("http:"));
        assert!(!is_absolute_uri("http://a b"));
    }

    #[test]
    fn test_resolve_relative() {
        assert_eq!(
            Kid::resolve("abc", BASE),
            KidRef::Stored(Kid::new("http://localhost:4000/jwks/abc"))
        );
    }

    #[test]
    fn test_resolve_absolute_other_domain() {
        assert_eq!(
            Kid::resolve("https://foobar/jwks/abc", BASE),
            KidRef::Stored(Kid::new("https://foobar/jwks/abc"))
        );
    }

    #[test]
    fn test_resolve_client_key() {
        assert_eq!(Kid::resolve("client_key", BASE), KidRef::ClientKey);
        assert_eq!(
            Kid::resolve("http://localhost:4000/jwks/client_key", BASE),
            KidRef::ClientKey
        );
    }

    #[test]
    fn test_named_keeps_absolute() {
        let kid = Kid::named(BASE, "http://localhost:4000/jwks/foo");
        assert_eq!(kid.as_str(), "http://localhost:4000/jwks/foo");

        let kid = Kid::named(BASE, "foo");
        assert_eq!(kid.as_str(), "http://localhost:4000/jwks/foo");
    }

    #[test]
    fn test_is_under() {
        let kid = Kid::new("http://localhost:4000/jwks/enc_x");
        assert!(kid.is_under(BASE));
        assert!(kid.is_under("http://localhost:4000/jwks/"));
        assert!(!kid.is_under("http://localhost:4000/jw"));
        assert!(!kid.is_under("https://other/jwks"));
    }
}

//! Consent requests and approvals.
//!
//! A consent request asks a subject for access to a list of scope entries.
//! The approval that comes back names the consent, the public keys involved
//! (base64 PEM, by kid) and, per granted scope, which of those kids may read
//! documents there.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{PermsError, Result};
use crate::permission::{LawfulBasis, PermissionType};

/// One requested scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeEntry {
    /// Defaults to the requesting client's id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    pub area: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub permissions: Vec<PermissionType>,

    pub purpose: String,

    pub lawful_basis: LawfulBasis,
}

/// What a client asks the subject to consent to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRequestDescription {
    pub scope: Vec<ScopeEntry>,

    /// Unix milliseconds after which the consent lapses.
    pub expiry: i64,
}

impl ConsentRequestDescription {
    /// Validate the request before anything is minted for it.
    pub fn validate(&self) -> Result<()> {
        if self.scope.is_empty() {
            return Err(PermsError::InvalidPayload("consent request has no scope".into()));
        }
        if self.expiry <= 0 {
            return Err(PermsError::InvalidPayload("consent request has no expiry".into()));
        }
        for (i, entry) in self.scope.iter().enumerate() {
            if entry.area.trim().is_empty() {
                return Err(PermsError::InvalidPayload(format!("scope[{}] has no area", i)));
            }
            if entry.permissions.is_empty() {
                return Err(PermsError::InvalidPayload(format!(
                    "scope[{}] ({}) requests no permissions",
                    i, entry.area
                )));
            }
            if entry.purpose.trim().is_empty() {
                return Err(PermsError::InvalidPayload(format!(
                    "scope[{}] ({}) has no purpose",
                    i, entry.area
                )));
            }
        }
        Ok(())
    }
}

/// Recipients granted for one scope of an approved consent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedScope {
    pub domain: String,
    pub area: String,

    /// Kids allowed to read documents in this scope.
    #[serde(alias = "readKeys")]
    pub access_key_ids: Vec<String>,
}

/// An approved consent, as delivered back to the requesting client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentApproval {
    pub consent_id: String,

    /// Base64-encoded PEM public keys by kid.
    pub keys: BTreeMap<String, String>,

    pub scope: Vec<ApprovedScope>,
}

impl ConsentApproval {
    /// Check the approval is complete and self-consistent.
    ///
    /// Every kid named in a scope must appear in `keys`.
    pub fn validate(&self) -> Result<()> {
        if self.consent_id.trim().is_empty() {
            return Err(PermsError::InvalidPayload("approval has no consentId".into()));
        }
        for scope in &self.scope {
            if scope.domain.is_empty() || scope.area.is_empty() {
                return Err(PermsError::InvalidPayload(format!(
                    "approval {} has a scope without domain or area",
                    self.consent_id
                )));
            }
            if let Some(kid) = scope.access_key_ids.iter().find(|kid| !self.keys.contains_key(*kid)) {
                return Err(PermsError::InvalidPayload(format!(
                    "scope {}/{} names unknown key {}",
                    scope.domain, scope.area, kid
                )));
            }
        }
        Ok(())
    }

    /// Decode the PEM text of the key published under `kid`.
    pub fn key_pem(&self, kid: &str) -> Result<Option<String>> {
        let Some(encoded) = self.keys.get(kid) else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| PermsError::InvalidPayload(format!("key {} is not base64: {}", kid, e)))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| PermsError::InvalidPayload(format!("key {} is not UTF-8: {}", kid, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> ConsentRequestDescription {
        serde_json::from_value(serde_json::json!({
            "scope": [{
                "area": "education",
                "description": "Your schools",
                "permissions": ["READ", "WRITE"],
                "purpose": "In order to recommend jobs",
                "lawfulBasis": "CONSENT"
            }],
            "expiry": 1_900_000_000_000i64
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_request() {
        request().validate().unwrap();
    }

    #[test]
    fn test_request_validation_failures() {
        let mut r = request();
        r.scope.clear();
        assert!(r.validate().is_err());

        let mut r = request();
        r.scope[0].permissions.clear();
        assert!(r.validate().is_err());

        let mut r = request();
        r.scope[0].purpose = " ".into();
        assert!(r.validate().is_err());

        let mut r = request();
        r.expiry = 0;
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_request_rejects_unknown_permission() {
        let parsed: std::result::Result<ConsentRequestDescription, _> =
            serde_json::from_value(serde_json::json!({
                "scope": [{
                    "area": "a", "permissions": ["DELETE"], "purpose": "p", "lawfulBasis": "CONSENT"
                }],
                "expiry": 1
            }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_approval_accepts_read_keys_alias() {
        let pem = "-----BEGIN PUBLIC KEY-----\nabc\n-----END PUBLIC KEY-----\n";
        let approval: ConsentApproval = serde_json::from_value(serde_json::json!({
            "consentId": "c1",
            "keys": { "http://other/jwks/k": STANDARD.encode(pem) },
            "scope": [{ "domain": "d", "area": "a", "readKeys": ["http://other/jwks/k"] }]
        }))
        .unwrap();
        approval.validate().unwrap();
        assert_eq!(approval.key_pem("http://other/jwks/k").unwrap().as_deref(), Some(pem));
        assert_eq!(approval.key_pem("missing").unwrap(), None);
    }

    #[test]
    fn test_approval_scope_must_reference_known_keys() {
        let approval = ConsentApproval {
            consent_id: "c1".into(),
            keys: BTreeMap::new(),
            scope: vec![ApprovedScope {
                domain: "d".into(),
                area: "a".into(),
                access_key_ids: vec!["http://other/jwks/k".into()],
            }],
        };
        assert!(matches!(approval.validate(), Err(PermsError::InvalidPayload(_))));
    }
}

//! Permission rows.
//!
//! A client advertises permissions it would like to hold when a connection is
//! initiated. Each row covers one `(domain, area, type)`. `READ` rows carry the
//! public half of a freshly minted encryption key so the subject's data can be
//! wrapped for this client once the permission is approved. `WRITE` rows only
//! describe what will be written.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use consent_kernel_core::{Jwk, Jwks};

use crate::error::{PermsError, Result};

/// Kind of access a permission grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    /// Read documents in the scope.
    Read,
    /// Write documents into the scope.
    Write,
}

/// Legal basis for processing, as in GDPR Art. 6(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LawfulBasis {
    #[default]
    Consent,
    Contract,
    LegalObligation,
    VitalInterests,
    PublicTask,
    LegitimateInterests,
}

/// A permission template from client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultPermission {
    /// Defaults to the client id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    pub area: String,

    /// One permission row is produced per entry.
    pub types: Vec<PermissionType>,

    /// Defaults to [`LawfulBasis::Consent`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lawful_basis: Option<LawfulBasis>,

    /// Why the data is read. Required for `READ`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    /// What is written. Required for `WRITE`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl DefaultPermission {
    /// Check the template is usable.
    pub fn validate(&self) -> Result<()> {
        if self.area.trim().is_empty() {
            return Err(PermsError::InvalidPayload("default permission without area".into()));
        }
        if self.types.is_empty() {
            return Err(PermsError::InvalidPayload(format!(
                "default permission for area {} has no types",
                self.area
            )));
        }
        Ok(())
    }
}

/// A concrete permission row sent in a connection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    /// Random v4 UUID.
    pub id: String,

    pub domain: String,
    pub area: String,

    #[serde(rename = "type")]
    pub permission_type: PermissionType,

    pub lawful_basis: LawfulBasis,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Public half of the encryption key minted for a `READ` row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
}

impl Permission {
    /// A `READ` row advertising `jwk`.
    pub fn read(template: &DefaultPermission, client_id: &str, jwk: Jwk) -> Self {
        Self {
            purpose: template.purpose.clone(),
            jwk: Some(jwk.public_view()),
            ..Self::base(template, client_id, PermissionType::Read)
        }
    }

    /// A `WRITE` row.
    pub fn write(template: &DefaultPermission, client_id: &str) -> Self {
        Self {
            description: template.description.clone(),
            ..Self::base(template, client_id, PermissionType::Write)
        }
    }

    fn base(template: &DefaultPermission, client_id: &str, permission_type: PermissionType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            domain: template
                .domain
                .clone()
                .unwrap_or_else(|| client_id.to_string()),
            area: template.area.clone(),
            permission_type,
            lawful_basis: template.lawful_basis.unwrap_or_default(),
            purpose: None,
            description: None,
            jwk: None,
        }
    }

    /// The kid of the advertised key, for `READ` rows.
    pub fn kid(&self) -> Option<&str> {
        self.jwk.as_ref().and_then(|jwk| jwk.kid.as_deref())
    }
}

/// A permission the subject approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedPermission {
    pub id: String,
    pub domain: String,
    pub area: String,

    #[serde(rename = "type")]
    pub permission_type: PermissionType,

    #[serde(default)]
    pub lawful_basis: LawfulBasis,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// `READ`: the kid of the temporary key this client advertised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// `WRITE`: the public keys that must be able to read what is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwks: Option<Jwks>,
}

impl ApprovedPermission {
    /// Check the fields required by the permission type are present.
    pub fn validate(&self) -> Result<()> {
        if self.domain.is_empty() || self.area.is_empty() {
            return Err(PermsError::InvalidPayload(format!(
                "permission {} is missing domain or area",
                self.id
            )));
        }
        match self.permission_type {
            PermissionType::Read if self.kid.as_deref().map_or(true, str::is_empty) => {
                Err(PermsError::InvalidPayload(format!(
                    "READ permission {} has no kid",
                    self.id
                )))
            }
            PermissionType::Write if self.jwks.as_ref().map_or(true, Jwks::is_empty) => {
                Err(PermsError::InvalidPayload(format!(
                    "WRITE permission {} has no jwks",
                    self.id
                )))
            }
            _ => Ok(()),
        }
    }
}

/// The subject's decision on requested permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovedPermissions {
    #[serde(default)]
    pub approved: Vec<ApprovedPermission>,
}

impl ApprovedPermissions {
    /// Validate every approved row.
    pub fn validate(&self) -> Result<()> {
        self.approved.iter().try_for_each(ApprovedPermission::validate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use consent_kernel_core::KeyUse;

    const CLIENT: &str = "http://localhost:4000";

    fn template() -> DefaultPermission {
        DefaultPermission {
            domain: None,
            area: "favorite_cats".into(),
            types: vec![PermissionType::Read, PermissionType::Write],
            lawful_basis: None,
            purpose: Some("To recommend cats".into()),
            description: Some("Cats you liked".into()),
        }
    }

    fn jwk() -> Jwk {
        Jwk {
            kty: "RSA".into(),
            kid: None,
            key_use: None,
            alg: None,
            n: "nnn".into(),
            e: "AQAB".into(),
            d: Some("ddd".into()),
            p: None,
            q: None,
        }
        .with_metadata("http://localhost:4000/jwks/enc_x", KeyUse::Enc, None)
    }

    #[test]
    fn test_read_row() {
        let row = Permission::read(&template(), CLIENT, jwk());
        assert_eq!(row.domain, CLIENT);
        assert_eq!(row.lawful_basis, LawfulBasis::Consent);
        assert_eq!(row.purpose.as_deref(), Some("To recommend cats"));
        assert!(row.description.is_none());
        assert_eq!(row.kid(), Some("http://localhost:4000/jwks/enc_x"));
        // Never advertise private members.
        assert!(!row.jwk.as_ref().unwrap().is_private());
        assert!(Uuid::parse_str(&row.id).is_ok());
    }

    #[test]
    fn test_write_row_serialization() {
        let row = Permission::write(&template(), CLIENT);
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["type"], "WRITE");
        assert_eq!(json["lawfulBasis"], "CONSENT");
        assert_eq!(json["description"], "Cats you liked");
        assert!(json.get("jwk").is_none());
        assert!(json.get("purpose").is_none());
    }

    #[test]
    fn test_rows_get_distinct_ids() {
        let a = Permission::write(&template(), CLIENT);
        let b = Permission::write(&template(), CLIENT);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_default_permission_from_config_json() {
        let parsed: DefaultPermission = serde_json::from_value(serde_json::json!({
            "area": "edu",
            "types": ["READ"],
            "lawfulBasis": "LEGITIMATE_INTERESTS",
            "purpose": "because"
        }))
        .unwrap();
        assert_eq!(parsed.lawful_basis, Some(LawfulBasis::LegitimateInterests));
        parsed.validate().unwrap();

        let empty = DefaultPermission { types: vec![], ..parsed };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_approved_permission_requirements() {
        let read: ApprovedPermission = serde_json::from_value(serde_json::json!({
            "id": "1", "domain": "d", "area": "a", "type": "READ"
        }))
        .unwrap();
        assert!(matches!(read.validate(), Err(PermsError::InvalidPayload(_))));

        let read = ApprovedPermission {
            kid: Some("http://localhost:4000/jwks/enc_x".into()),
            ..read
        };
        read.validate().unwrap();

        let write = ApprovedPermission {
            permission_type: PermissionType::Write,
            kid: None,
            jwks: Some(Jwks::default()),
            ..read
        };
        assert!(write.validate().is_err());

        let write = ApprovedPermission {
            jwks: Some(Jwks::new(vec![jwk().public_view()])),
            ..write
        };
        write.validate().unwrap();
    }
}

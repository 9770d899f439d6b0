//! Client configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use consent_kernel_core::{is_absolute_uri, key::MIN_MODULUS_BITS};
use consent_kernel_operator::ConnectConfig;
use consent_kernel_perms::{BodyScheme, DefaultPermission};

use crate::error::{KernelError, Result};

/// Minimum length of the service description shown to subjects.
pub const MIN_DESCRIPTION_LEN: usize = 10;

/// The only signing algorithm the token service implements.
pub const SUPPORTED_ALG: &str = "RS256";

/// Key generation options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KeyOptions {
    /// Lifetime of temporary keys, in milliseconds.
    #[serde(rename = "tempKeyExpiry")]
    pub temp_key_expiry_ms: u64,
    /// RSA modulus length in bits.
    pub modulus_length: usize,
}

impl Default for KeyOptions {
    fn default() -> Self {
        Self {
            temp_key_expiry_ms: 10 * 60 * 1000,
            modulus_length: 2048,
        }
    }
}

impl KeyOptions {
    /// TTL applied to temporary keys.
    pub fn temp_key_ttl(&self) -> Duration {
        Duration::from_millis(self.temp_key_expiry_ms)
    }
}

/// Configuration for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Absolute base URI of this service. Also the `iss` of every token.
    pub client_id: String,

    pub display_name: String,

    pub description: String,

    #[serde(rename = "iconURI", default, skip_serializing_if = "Option::is_none")]
    pub icon_uri: Option<String>,

    /// Absolute base URI of the operator.
    pub operator: String,

    #[serde(default = "default_jwks_path")]
    pub jwks_path: String,

    #[serde(default = "default_events_path")]
    pub events_path: String,

    #[serde(default = "default_alg")]
    pub alg: String,

    #[serde(default)]
    pub key_options: KeyOptions,

    /// Permissions requested whenever a connection is initiated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_permissions: Option<Vec<DefaultPermission>>,

    #[serde(default)]
    pub connect: ConnectConfig,

    /// Symmetric scheme for document bodies.
    #[serde(default)]
    pub body_scheme: BodyScheme,
}

fn default_jwks_path() -> String {
    "/jwks".to_string()
}

fn default_events_path() -> String {
    "/events".to_string()
}

fn default_alg() -> String {
    SUPPORTED_ALG.to_string()
}

impl ClientConfig {
    /// A configuration with every optional field at its default.
    pub fn new(
        client_id: impl Into<String>,
        operator: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            display_name: display_name.into(),
            description: description.into(),
            icon_uri: None,
            operator: operator.into(),
            jwks_path: default_jwks_path(),
            events_path: default_events_path(),
            alg: default_alg(),
            key_options: KeyOptions::default(),
            default_permissions: None,
            connect: ConnectConfig::default(),
            body_scheme: BodyScheme::default(),
        }
    }

    /// `client_id + jwks_path`.
    pub fn jwks_uri(&self) -> String {
        join(&self.client_id, &self.jwks_path)
    }

    /// `client_id + events_path`.
    pub fn events_uri(&self) -> String {
        join(&self.client_id, &self.events_path)
    }

    /// Where service registrations are POSTed.
    pub fn operator_api(&self) -> String {
        join(&self.operator, "/api")
    }

    /// Where consent requests are POSTed.
    pub fn consent_requests_uri(&self) -> String {
        join(&self.operator, "/api/consents/requests")
    }

    /// Check the configuration, naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if !is_absolute_uri(&self.client_id) {
            return invalid("clientId must be an absolute URI");
        }
        if !is_absolute_uri(&self.operator) {
            return invalid("operator must be an absolute URI");
        }
        if self.display_name.trim().is_empty() {
            return invalid("displayName is required");
        }
        if self.description.chars().count() < MIN_DESCRIPTION_LEN {
            return invalid("description must be at least 10 characters");
        }
        if let Some(icon) = &self.icon_uri {
            if !is_absolute_uri(icon) {
                return invalid("iconURI must be an absolute URI");
            }
        }
        if !self.jwks_path.starts_with('/') || !self.events_path.starts_with('/') {
            return invalid("jwksPath and eventsPath must start with '/'");
        }
        if self.alg != SUPPORTED_ALG {
            return Err(KernelError::Validation(format!(
                "alg {} is not supported",
                self.alg
            )));
        }
        if self.key_options.temp_key_expiry_ms == 0 {
            return invalid("keyOptions.tempKeyExpiry must be positive");
        }
        if self.key_options.modulus_length < MIN_MODULUS_BITS {
            return Err(KernelError::Validation(format!(
                "keyOptions.modulusLength must be at least {}",
                MIN_MODULUS_BITS
            )));
        }
        if let Some(defaults) = &self.default_permissions {
            if defaults.is_empty() {
                return invalid("defaultPermissions must not be empty");
            }
            for permission in defaults {
                permission.validate()?;
            }
        }
        Ok(())
    }
}

fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

fn invalid(msg: &str) -> Result<()> {
    Err(KernelError::Validation(msg.to_string()))
}

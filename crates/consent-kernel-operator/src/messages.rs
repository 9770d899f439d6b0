//! Handshake message types.
//!
//! Claim sets are the JSON payloads of the JWTs exchanged with the operator
//! and the subject's account app. They are tagged by a `type` member.
//! [`OperatorEvent`] is the outer body POSTed to the client's events endpoint.

use serde::{Deserialize, Serialize};

use consent_kernel_perms::{
    ApprovedPermissions, ConsentApproval, ConsentRequestDescription, Permission,
};

use crate::error::{OperatorError, Result};

/// Audience of tokens handed to the subject's account app.
pub const ACCOUNT_AUDIENCE: &str = "mydata://account";

/// Deep link that opens an authentication request in the account app.
pub fn authentication_url(token: &str) -> String {
    format!("{}/{}", ACCOUNT_AUDIENCE, token)
}

/// Signed claim sets, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Claims {
    ServiceRegistration(ServiceRegistration),
    AuthenticationRequest(AuthenticationRequest),
    ConnectionInit(ConnectionInit),
    ConnectionRequest(ConnectionRequest),
    Connection(Connection),
    AccessToken(AccessToken),
    ConsentRequest(ConsentRequest),
}

impl Claims {
    /// The `type` tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            Claims::ServiceRegistration(_) => "SERVICE_REGISTRATION",
            Claims::AuthenticationRequest(_) => "AUTHENTICATION_REQUEST",
            Claims::ConnectionInit(_) => "CONNECTION_INIT",
            Claims::ConnectionRequest(_) => "CONNECTION_REQUEST",
            Claims::Connection(_) => "CONNECTION",
            Claims::AccessToken(_) => "ACCESS_TOKEN",
            Claims::ConsentRequest(_) => "CONSENT_REQUEST",
        }
    }

    /// Convert to a JSON object for signing.
    pub fn to_value(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| OperatorError::SerializationError(e.to_string()))
    }

    /// Parse a verified token payload.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| OperatorError::InvalidMessage(e.to_string()))
    }
}

/// Registers the client with the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    pub iss: String,
    pub aud: String,
    pub display_name: String,
    pub description: String,
    #[serde(rename = "eventsURI")]
    pub events_uri: String,
    #[serde(rename = "jwksURI")]
    pub jwks_uri: String,
    #[serde(rename = "iconURI", default, skip_serializing_if = "Option::is_none")]
    pub icon_uri: Option<String>,
}

/// Asks the subject's account app to log in to this client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationRequest {
    pub iss: String,
    pub aud: String,
    pub sid: String,
    #[serde(rename = "eventsURI")]
    pub events_uri: String,
}

/// The account app starts a connection for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInit {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub sid: String,
}

/// The client's answer to a [`ConnectionInit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    pub iss: String,
    pub aud: String,
    pub sid: String,
    pub display_name: String,
    pub description: String,
    #[serde(rename = "iconURI", default, skip_serializing_if = "Option::is_none")]
    pub icon_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<Permission>>,
}

/// An established connection, with the permissions the subject approved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub iss: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    pub sid: String,
    /// Connection (subject) id.
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ApprovedPermissions>,
}

impl Connection {
    /// Check the required fields and every approved permission.
    pub fn validate(&self) -> Result<()> {
        if self.sid.is_empty() || self.sub.is_empty() {
            return Err(OperatorError::InvalidMessage(
                "connection is missing sid or sub".into(),
            ));
        }
        if let Some(permissions) = &self.permissions {
            permissions
                .validate()
                .map_err(|e| OperatorError::InvalidMessage(e.to_string()))?;
        }
        Ok(())
    }
}

/// Access token issued by the client to itself for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub iss: String,
    pub aud: String,
    pub sub: String,
}

/// A consent request, carrying the kid readers should wrap for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentRequest {
    pub iss: String,
    pub aud: String,
    pub client_id: String,
    pub kid: String,
    #[serde(flatten)]
    pub description: ConsentRequestDescription,
}

/// A JWT delivered inside an event body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub payload: String,
}

/// Event bodies POSTed to the client's events endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorEvent {
    ConnectionInit(ConnectionInit),
    ConnectionEvent(SignedPayload),
    ConsentApproved(ConsentApproval),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_are_tagged() {
        let claims = Claims::AccessToken(AccessToken {
            iss: "http://c".into(),
            aud: "http://c".into(),
            sub: "conn-1".into(),
        });
        let value = claims.to_value().unwrap();
        assert_eq!(value, json!({"type": "ACCESS_TOKEN", "iss": "http://c", "aud": "http://c", "sub": "conn-1"}));
        assert_eq!(claims.type_name(), "ACCESS_TOKEN");
        assert_eq!(Claims::from_value(value).unwrap(), claims);
    }

    #[test]
    fn test_service_registration_member_names() {
        let value = Claims::ServiceRegistration(ServiceRegistration {
            iss: "http://c".into(),
            aud: "http://op".into(),
            display_name: "Cats".into(),
            description: "All about cats".into(),
            events_uri: "http://c/events".into(),
            jwks_uri: "http://c/jwks".into(),
            icon_uri: None,
        })
        .to_value()
        .unwrap();

        assert_eq!(value["type"], "SERVICE_REGISTRATION");
        assert_eq!(value["displayName"], "Cats");
        assert_eq!(value["eventsURI"], "http://c/events");
        assert_eq!(value["jwksURI"], "http://c/jwks");
        assert!(value.get("iconURI").is_none());
    }

    #[test]
    fn test_connection_claims_parse_and_validate() {
        let claims = Claims::from_value(json!({
            "type": "CONNECTION",
            "iss": "mydata://account",
            "sid": "s1",
            "sub": "conn-1",
            "permissions": { "approved": [
                { "id": "p1", "domain": "http://c", "area": "cats", "type": "READ",
                  "kid": "http://c/jwks/enc_x" }
            ]}
        }))
        .unwrap();

        let Claims::Connection(connection) = claims else {
            panic!("expected connection claims");
        };
        connection.validate().unwrap();

        let broken = Connection {
            sub: String::new(),
            ..connection
        };
        assert!(broken.validate().is_err());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(matches!(
            Claims::from_value(json!({"type": "DATA_READ", "iss": "x"})),
            Err(OperatorError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_consent_request_flattens_description() {
        let value = Claims::ConsentRequest(ConsentRequest {
            iss: "http://c".into(),
            aud: "http://op".into(),
            client_id: "http://c".into(),
            kid: "http://c/jwks/enc_x".into(),
            description: serde_json::from_value(json!({
                "scope": [{"area": "a", "permissions": ["READ"], "purpose": "p", "lawfulBasis": "CONSENT"}],
                "expiry": 1
            }))
            .unwrap(),
        })
        .to_value()
        .unwrap();
        assert_eq!(value["clientId"], "http://c");
        assert_eq!(value["scope"][0]["area"], "a");
        assert_eq!(value["expiry"], 1);
    }

    #[test]
    fn test_event_bodies() {
        let event: OperatorEvent = serde_json::from_value(json!({
            "type": "CONNECTION_EVENT",
            "payload": { "payload": "a.b.c" }
        }))
        .unwrap();
        assert_eq!(
            event,
            OperatorEvent::ConnectionEvent(SignedPayload { payload: "a.b.c".into() })
        );

        let event: OperatorEvent = serde_json::from_value(json!({
            "type": "CONNECTION_INIT",
            "payload": { "iss": "mydata://account", "sid": "s1" }
        }))
        .unwrap();
        assert!(matches!(event, OperatorEvent::ConnectionInit(ref init) if init.sid == "s1"));
    }

    #[test]
    fn test_authentication_url() {
        assert_eq!(authentication_url("a.b.c"), "mydata://account/a.b.c");
    }
}

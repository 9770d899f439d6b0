//! Connection handshake: sessions, connection requests and connection events.
//!
//! ```text
//! UNINITIATED -> INIT_SENT -> EVENT_RECEIVED -> AUTHORIZED
//!                                           \-> REJECTED
//! ```
//!
//! A session enters `INIT_SENT` when this client sends an authentication
//! request or answers a `CONNECTION_INIT`. The signed `CONNECTION` event that
//! follows is verified and validated in full before anything is written;
//! a failure while applying its side effects settles the session as
//! `REJECTED` and is returned to the caller.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use consent_kernel_core::KeyUse;
use consent_kernel_operator::{AccessToken, Claims, Connection, ConnectionInit, ConnectionRequest};
use consent_kernel_perms::{ApprovedPermissions, Permission, PermissionType};
use consent_kernel_store::{KeyValueStore, KeyValueStoreExt};

use crate::config::ClientConfig;
use crate::error::{KernelError, Result};
use crate::keys::KeyProvider;
use crate::ledger::AccessLedger;
use crate::tokens::{sign_claims, TokenService};

const SESSION_PREFIX: &str = "session|>";
const AUTHENTICATION_PREFIX: &str = "authentication|>";
const APPROVED_PERMISSIONS_PREFIX: &str = "approvedPermissions|>";

/// Where a session is in the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    Uninitiated,
    InitSent,
    EventReceived,
    Authorized,
    Rejected,
}

impl SessionState {
    /// Whether the session has reached a final state.
    pub fn is_settled(&self) -> bool {
        matches!(self, SessionState::Authorized | SessionState::Rejected)
    }
}

/// Persisted handshake state for one session id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub sid: String,
    pub state: SessionState,
    /// Connection id, once the subject connected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
}

impl Session {
    fn new(sid: &str, state: SessionState) -> Self {
        Self {
            sid: sid.to_string(),
            state,
            sub: None,
        }
    }
}

/// Handles `CONNECTION_INIT` and `CONNECTION` events.
pub struct ConnectionHandler<S: KeyValueStore> {
    config: Arc<ClientConfig>,
    keys: Arc<KeyProvider<S>>,
    ledger: AccessLedger<S>,
    tokens: Arc<dyn TokenService>,
}

impl<S: KeyValueStore> ConnectionHandler<S> {
    /// Create a handler.
    pub fn new(
        config: Arc<ClientConfig>,
        keys: Arc<KeyProvider<S>>,
        tokens: Arc<dyn TokenService>,
    ) -> Self {
        let ledger = AccessLedger::new(keys.clone());
        Self {
            config,
            keys,
            ledger,
            tokens,
        }
    }

    fn store(&self) -> &S {
        self.keys.store()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// The state of `sid`, if known.
    pub async fn get_session(&self, sid: &str) -> Result<Option<Session>> {
        Ok(self
            .store()
            .load_json(&format!("{}{}", SESSION_PREFIX, sid))
            .await?)
    }

    async fn save_session(&self, session: &Session, ttl: Option<Duration>) -> Result<()> {
        self.store()
            .save_json(&format!("{}{}", SESSION_PREFIX, session.sid), session, ttl)
            .await?;
        Ok(())
    }

    /// Mark `sid` as waiting for a connection event, expiring after `ttl`.
    pub async fn begin_session(&self, sid: &str, ttl: Duration) -> Result<()> {
        self.save_session(&Session::new(sid, SessionState::InitSent), Some(ttl))
            .await
    }

    /// The access token stored for a session once it connected.
    pub async fn get_authentication(&self, sid: &str) -> Result<Option<String>> {
        Ok(self
            .store()
            .load_json(&format!("{}{}", AUTHENTICATION_PREFIX, sid))
            .await?)
    }

    /// The permissions a subject approved for connection `sub`.
    pub async fn get_approved_permissions(&self, sub: &str) -> Result<Option<ApprovedPermissions>> {
        Ok(self
            .store()
            .load_json(&format!("{}{}", APPROVED_PERMISSIONS_PREFIX, sub))
            .await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // CONNECTION_INIT
    // ─────────────────────────────────────────────────────────────────────────

    /// Materialize the configured default permissions.
    ///
    /// One row per area and type. Each `READ` row advertises a freshly minted
    /// temporary encryption key.
    pub async fn create_permissions(&self) -> Result<Option<Vec<Permission>>> {
        let Some(templates) = &self.config.default_permissions else {
            return Ok(None);
        };

        let mut rows = Vec::new();
        for template in templates {
            for permission_type in &template.types {
                let row = match permission_type {
                    PermissionType::Read => {
                        let key = self.keys.generate_temporary_key(KeyUse::Enc).await?;
                        Permission::read(template, &self.config.client_id, key.to_jwk())
                    }
                    PermissionType::Write => Permission::write(template, &self.config.client_id),
                };
                rows.push(row);
            }
        }
        Ok(Some(rows))
    }

    /// Answer a `CONNECTION_INIT` with a signed `CONNECTION_REQUEST`.
    pub async fn on_connection_init(&self, init: &ConnectionInit) -> Result<String> {
        if init.sid.trim().is_empty() {
            return Err(KernelError::Validation("CONNECTION_INIT has no sid".into()));
        }
        if let Some(session) = self.get_session(&init.sid).await? {
            if !matches!(session.state, SessionState::Uninitiated | SessionState::InitSent) {
                return Err(KernelError::Validation(format!(
                    "session {} is already {:?}",
                    init.sid, session.state
                )));
            }
        }

        let permissions = self.create_permissions().await?;
        let requested = permissions.as_ref().map_or(0, Vec::len);
        let claims = Claims::ConnectionRequest(ConnectionRequest {
            iss: self.config.client_id.clone(),
            aud: init.iss.clone(),
            sid: init.sid.clone(),
            display_name: self.config.display_name.clone(),
            description: self.config.description.clone(),
            icon_uri: self.config.icon_uri.clone(),
            permissions,
        });
        let token = sign_claims(self.tokens.as_ref(), &claims, self.keys.client_key()).await?;

        // Unanswered sessions lapse together with the keys they advertised.
        self.begin_session(&init.sid, self.keys.options().temp_key_ttl())
            .await?;

        info!(sid = %init.sid, requested, "sent connection request");
        Ok(token)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // CONNECTION
    // ─────────────────────────────────────────────────────────────────────────

    /// Verify a signed `CONNECTION` event and apply it.
    ///
    /// Nothing is written unless the token verifies, the claims validate and
    /// the session is waiting for an event.
    pub async fn on_connection_event(&self, token: &str) -> Result<Connection> {
        let verified = self.tokens.verify(token).await?;
        let claims = Claims::from_value(verified.payload)
            .map_err(|e| KernelError::Validation(e.to_string()))?;
        let connection = match claims {
            Claims::Connection(connection) => connection,
            other => {
                return Err(KernelError::Validation(format!(
                    "expected CONNECTION, got {}",
                    other.type_name()
                )))
            }
        };
        connection
            .validate()
            .map_err(|e| KernelError::Validation(e.to_string()))?;

        let mut session = self
            .get_session(&connection.sid)
            .await?
            .ok_or_else(|| KernelError::Validation(format!("unknown session {}", connection.sid)))?;
        if session.state != SessionState::InitSent {
            return Err(KernelError::Validation(format!(
                "session {} is {:?}, not waiting for a connection",
                session.sid, session.state
            )));
        }

        session.state = SessionState::EventReceived;
        session.sub = Some(connection.sub.clone());
        self.save_session(&session, None).await?;

        match self.apply_connection(&connection).await {
            Ok(()) => {
                session.state = SessionState::Authorized;
                self.save_session(&session, None).await?;
                info!(sid = %connection.sid, sub = %connection.sub, "connection authorized");
                Ok(connection)
            }
            Err(error) => {
                self.revoke_connection(&connection).await?;
                session.state = SessionState::Rejected;
                self.save_session(&session, None).await?;
                warn!(sid = %connection.sid, %error, "connection rejected");
                Err(error)
            }
        }
    }

    async fn apply_connection(&self, connection: &Connection) -> Result<()> {
        let permissions = connection.permissions.clone().unwrap_or_default();

        // Every advertised key and write set must be in place before the first write.
        let mut promote = Vec::new();
        let mut writes = Vec::new();
        for permission in &permissions.approved {
            match permission.permission_type {
                PermissionType::Read => {
                    let kid = permission.kid.as_deref().ok_or_else(|| {
                        KernelError::Validation(format!("READ permission {} has no kid", permission.id))
                    })?;
                    self.keys.require_key(kid).await?;
                    promote.push(kid);
                }
                PermissionType::Write => {
                    let jwks = permission.jwks.clone().ok_or_else(|| {
                        KernelError::Validation(format!("WRITE permission {} has no jwks", permission.id))
                    })?;
                    writes.push((permission, jwks));
                }
            }
        }

        for kid in promote {
            self.keys.make_key_permanent(kid).await?;
        }
        for (permission, jwks) in writes {
            self.ledger
                .save_write_keys(&permission.domain, &permission.area, jwks)
                .await?;
            self.ledger
                .save_permission_id(&permission.domain, &permission.area, &permission.id)
                .await?;
        }

        self.store()
            .save_json(
                &format!("{}{}", APPROVED_PERMISSIONS_PREFIX, connection.sub),
                &permissions,
                None,
            )
            .await?;

        let access_token = Claims::AccessToken(AccessToken {
            iss: self.config.client_id.clone(),
            aud: self.config.client_id.clone(),
            sub: connection.sub.clone(),
        });
        let access_token =
            sign_claims(self.tokens.as_ref(), &access_token, self.keys.client_key()).await?;
        self.store()
            .save_json(
                &format!("{}{}", AUTHENTICATION_PREFIX, connection.sid),
                &access_token,
                None,
            )
            .await?;
        Ok(())
    }

    /// Drop what a rejected connection may have granted.
    async fn revoke_connection(&self, connection: &Connection) -> Result<()> {
        self.store()
            .remove(&format!("{}{}", AUTHENTICATION_PREFIX, connection.sid))
            .await?;
        self.store()
            .remove(&format!("{}{}", APPROVED_PERMISSIONS_PREFIX, connection.sub))
            .await?;
        Ok(())
    }
}

//! The Client: one entry point over keys, ledger, cipher and handshakes.

use std::sync::Arc;
use std::time::Duration;

use rsa::RsaPrivateKey;
use tracing::info;
use uuid::Uuid;

use consent_kernel_core::{Jwk, Jwks};
use consent_kernel_operator::{
    authentication_url, AuthenticationRequest, Claims, Connection, ConnectionStatus, Connector,
    OperatorEvent, OperatorTransport, ServiceRegistration, ACCOUNT_AUDIENCE,
};
use consent_kernel_perms::{ConsentApproval, ConsentRequestDescription};
use consent_kernel_store::{KeyValueStore, KeyValueStoreExt};

use crate::config::ClientConfig;
use crate::connection::{ConnectionHandler, Session};
use crate::consents::{ConsentHandler, SignedConsentRequest};
use crate::document::DocumentCipher;
use crate::error::Result;
use crate::keys::KeyProvider;
use crate::ledger::AccessLedger;
use crate::tokens::{sign_claims, JwtTokenService, TokenService};

const AUTHENTICATION_REQUEST_PREFIX: &str = "authenticationRequest|>";

/// How long an authentication request stays valid.
pub const AUTHENTICATION_REQUEST_TTL: Duration = Duration::from_secs(5 * 60);

/// A freshly started authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationInit {
    /// Session id to poll with [`Client::get_authentication`].
    pub id: String,
    /// Deep link for the subject's account app.
    pub url: String,
}

/// A consent request the operator accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsentRequested {
    pub request: SignedConsentRequest,
    /// Operator response body.
    pub response: String,
}

/// What to send back for a handled event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventResponse {
    /// A signed `CONNECTION_REQUEST`, to be returned as `application/jwt`.
    ConnectionRequest(String),
    /// The connection that was established.
    Connected(Connection),
    /// The event was applied; nothing to return.
    Accepted,
}

/// The consent kernel client.
///
/// Provides a unified API for:
/// - Registering with the operator
/// - Authentication and connection handshakes
/// - Consent requests and approvals
/// - Encrypting and decrypting documents
/// - Serving the public key set
pub struct Client<S: KeyValueStore, T: OperatorTransport> {
    config: Arc<ClientConfig>,
    keys: Arc<KeyProvider<S>>,
    ledger: AccessLedger<S>,
    cipher: DocumentCipher<S>,
    tokens: Arc<dyn TokenService>,
    connections: ConnectionHandler<S>,
    consents: ConsentHandler<S>,
    connector: Connector<T>,
}

impl<S: KeyValueStore + 'static, T: OperatorTransport> Client<S, T> {
    /// Create a client after validating `config`.
    pub fn new(config: ClientConfig, client_key: &RsaPrivateKey, store: S, transport: T) -> Result<Self> {
        config.validate()?;

        let keys = Arc::new(KeyProvider::new(
            config.jwks_uri(),
            client_key,
            config.key_options.clone(),
            Arc::new(store),
        )?);
        let tokens: Arc<dyn TokenService> = Arc::new(JwtTokenService::new(keys.clone()));
        let connector = Connector::new(transport, config.connect.clone());
        let scheme = config.body_scheme;
        let config = Arc::new(config);

        Ok(Self {
            ledger: AccessLedger::new(keys.clone()),
            cipher: DocumentCipher::new(keys.clone(), scheme),
            connections: ConnectionHandler::new(config.clone(), keys.clone(), tokens.clone()),
            consents: ConsentHandler::new(config.clone(), keys.clone(), tokens.clone()),
            config,
            keys,
            tokens,
            connector,
        })
    }
}

impl<S: KeyValueStore, T: OperatorTransport> Client<S, T> {
    /// Get the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Get the key provider.
    pub fn keys(&self) -> &KeyProvider<S> {
        &self.keys
    }

    /// Get the access control ledger.
    pub fn ledger(&self) -> &AccessLedger<S> {
        &self.ledger
    }

    /// Get the document cipher.
    pub fn documents(&self) -> &DocumentCipher<S> {
        &self.cipher
    }

    /// Get the token service.
    pub fn tokens(&self) -> &dyn TokenService {
        self.tokens.as_ref()
    }

    /// Get the transport.
    pub fn transport(&self) -> &T {
        self.connector.transport()
    }

    /// Operator registration status.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.connector.status()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Operator
    // ─────────────────────────────────────────────────────────────────────────

    /// Register with the operator, retrying with backoff until accepted.
    ///
    /// Concurrent callers share one registration.
    pub async fn connect(&self) -> Result<()> {
        if self.connector.is_connected() {
            return Ok(());
        }
        let registration = Claims::ServiceRegistration(ServiceRegistration {
            iss: self.config.client_id.clone(),
            aud: self.config.operator.clone(),
            display_name: self.config.display_name.clone(),
            description: self.config.description.clone(),
            events_uri: self.config.events_uri(),
            jwks_uri: self.config.jwks_uri(),
            icon_uri: self.config.icon_uri.clone(),
        });
        let token = sign_claims(self.tokens(), &registration, self.keys.client_key()).await?;
        self.connector
            .connect(&self.config.operator_api(), &token)
            .await?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Authentication
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a login: sign an authentication request for a fresh session id
    /// and return the deep link that carries it.
    pub async fn initialize_authentication(&self) -> Result<AuthenticationInit> {
        let id = Uuid::new_v4().to_string();
        let claims = Claims::AuthenticationRequest(AuthenticationRequest {
            iss: self.config.client_id.clone(),
            aud: ACCOUNT_AUDIENCE.to_string(),
            sid: id.clone(),
            events_uri: self.config.events_uri(),
        });
        let token = sign_claims(self.tokens(), &claims, self.keys.client_key()).await?;

        self.keys
            .store()
            .save_json(
                &format!("{}{}", AUTHENTICATION_REQUEST_PREFIX, id),
                &token,
                Some(AUTHENTICATION_REQUEST_TTL),
            )
            .await?;
        self.connections
            .begin_session(&id, AUTHENTICATION_REQUEST_TTL)
            .await?;

        info!(sid = %id, "initialized authentication");
        Ok(AuthenticationInit {
            url: authentication_url(&token),
            id,
        })
    }

    /// The pending authentication request for `id`, until it expires.
    pub async fn get_authentication_request(&self, id: &str) -> Result<Option<String>> {
        Ok(self
            .keys
            .store()
            .load_json(&format!("{}{}", AUTHENTICATION_REQUEST_PREFIX, id))
            .await?)
    }

    /// The access token for session `id`, once the subject connected.
    pub async fn get_authentication(&self, id: &str) -> Result<Option<String>> {
        self.connections.get_authentication(id).await
    }

    /// Handshake state of session `id`.
    pub async fn get_session(&self, id: &str) -> Result<Option<Session>> {
        self.connections.get_session(id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Consents
    // ─────────────────────────────────────────────────────────────────────────

    /// Ask for consent: connect, sign the request and POST it to the operator.
    pub async fn request_consent(&self, description: &ConsentRequestDescription) -> Result<ConsentRequested> {
        self.connect().await?;
        let request = self.consents.request(description).await?;
        let response = self
            .connector
            .transport()
            .post_jwt(&self.config.consent_requests_uri(), &request.token)
            .await?;
        Ok(ConsentRequested { request, response })
    }

    /// Apply an approved consent.
    pub async fn on_consent_approved(&self, approval: &ConsentApproval) -> Result<()> {
        self.consents.on_approved(approval).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Events
    // ─────────────────────────────────────────────────────────────────────────

    /// Dispatch an event delivered to the events endpoint.
    pub async fn handle_event(&self, event: OperatorEvent) -> Result<EventResponse> {
        match event {
            OperatorEvent::ConnectionInit(init) => self
                .connections
                .on_connection_init(&init)
                .await
                .map(EventResponse::ConnectionRequest),
            OperatorEvent::ConnectionEvent(signed) => self
                .connections
                .on_connection_event(&signed.payload)
                .await
                .map(EventResponse::Connected),
            OperatorEvent::ConsentApproved(approval) => {
                self.consents.on_approved(&approval).await?;
                Ok(EventResponse::Accepted)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // JWKS
    // ─────────────────────────────────────────────────────────────────────────

    /// Body of `GET /jwks`.
    pub async fn jwks_key_list(&self) -> Result<Jwks> {
        self.keys.jwks_key_list().await
    }

    /// Body of `GET /jwks/:kid`.
    pub async fn jwks_key(&self, kid: &str) -> Result<Option<Jwk>> {
        self.keys.jwks_key(kid).await
    }
}

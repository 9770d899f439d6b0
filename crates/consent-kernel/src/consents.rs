//! Consent requests and approvals, with this client as the requester.

use std::sync::Arc;

use tracing::{info, warn};

use consent_kernel_core::{Key, KeyUse, Kid};
use consent_kernel_operator::{Claims, ConsentRequest};
use consent_kernel_perms::{ConsentApproval, ConsentRequestDescription};
use consent_kernel_store::KeyValueStore;

use crate::config::ClientConfig;
use crate::error::{KernelError, Result};
use crate::keys::KeyProvider;
use crate::ledger::AccessLedger;
use crate::tokens::{sign_claims, TokenService};

/// A signed consent request, ready to send to the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedConsentRequest {
    /// The temporary encryption key advertised in the request.
    pub kid: String,
    pub token: String,
}

/// Builds consent requests and ingests approvals.
pub struct ConsentHandler<S: KeyValueStore> {
    config: Arc<ClientConfig>,
    keys: Arc<KeyProvider<S>>,
    ledger: AccessLedger<S>,
    tokens: Arc<dyn TokenService>,
}

impl<S: KeyValueStore> ConsentHandler<S> {
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

    /// Validate `description`, mint a temporary encryption key for it and
    /// sign the request with the client key.
    ///
    /// Scope entries without a domain get this client's id.
    pub async fn request(&self, description: &ConsentRequestDescription) -> Result<SignedConsentRequest> {
        description.validate()?;

        let mut description = description.clone();
        for entry in description.scope.iter_mut().filter(|e| e.domain.is_none()) {
            entry.domain = Some(self.config.client_id.clone());
        }

        let key = self.keys.generate_temporary_key(KeyUse::Enc).await?;
        let claims = Claims::ConsentRequest(ConsentRequest {
            iss: self.config.client_id.clone(),
            aud: self.config.operator.clone(),
            client_id: self.config.client_id.clone(),
            kid: key.kid.to_string(),
            description,
        });
        let token = sign_claims(self.tokens.as_ref(), &claims, self.keys.client_key()).await?;

        info!(kid = %key.kid, "signed consent request");
        Ok(SignedConsentRequest {
            kid: key.kid.into_string(),
            token,
        })
    }

    /// Ingest an approved consent.
    ///
    /// Own kids (under this client's JWKS URI) must still resolve to a key
    /// with a private half; it is made permanent and recorded as the consent
    /// key. Every other kid is stored from the PEM in the approval. Then each
    /// approved scope gets its reader list. Nothing is written until every
    /// key in the approval has been checked.
    pub async fn on_approved(&self, approval: &ConsentApproval) -> Result<()> {
        approval.validate()?;

        let mut own = Vec::new();
        let mut external = Vec::new();
        for kid in approval.keys.keys() {
            if self.keys.is_own_kid(kid) {
                let key = self.keys.require_key(kid).await?;
                if !key.is_own() {
                    return Err(KernelError::Validation(format!(
                        "{} is under this client's key set but has no private key",
                        kid
                    )));
                }
                own.push(kid.as_str());
            } else {
                let pem = approval.key_pem(kid)?.ok_or_else(|| {
                    KernelError::Validation(format!("approval has no key for {}", kid))
                })?;
                external.push(Key::from_public_pem(Kid::new(kid.as_str()), KeyUse::Enc, &pem)?);
            }
        }

        for kid in &own {
            self.keys.make_key_permanent(kid).await?;
        }
        for key in &external {
            self.keys.save_key(key).await?;
        }

        match own.first() {
            Some(kid) => {
                self.ledger
                    .save_consent_key_id(&approval.consent_id, kid)
                    .await?
            }
            None => warn!(consent_id = %approval.consent_id, "approval names none of our keys"),
        }

        for scope in &approval.scope {
            self.ledger
                .save_access_key_ids(
                    &approval.consent_id,
                    &scope.domain,
                    &scope.area,
                    &scope.access_key_ids,
                )
                .await?;
        }

        info!(
            consent_id = %approval.consent_id,
            own = own.len(),
            external = external.len(),
            scopes = approval.scope.len(),
            "consent approved"
        );
        Ok(())
    }
}

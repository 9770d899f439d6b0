//! Operator registration with capped exponential backoff.
//!
//! [`Connector::connect`] POSTs a service registration until the operator
//! accepts it. Only one registration loop runs at a time: concurrent callers
//! queue on an async mutex and return as soon as the first one succeeds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::error::{OperatorError, Result};
use crate::transport::OperatorTransport;

/// Retry configuration for [`Connector`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectConfig {
    /// Delay after the first failure, in milliseconds.
    pub base_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Give up after this many attempts. `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            max_attempts: None,
        }
    }
}

impl ConnectConfig {
    /// `min(base * 2^attempt, max)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }
}

/// Registration state as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No registration attempted yet.
    Disconnected,
    /// A registration attempt is in flight (0-based).
    Connecting { attempt: u32 },
    /// The operator accepted the registration.
    Connected,
}

/// Single-flight operator registration.
pub struct Connector<T: OperatorTransport> {
    transport: T,
    config: ConnectConfig,
    in_flight: Mutex<()>,
    status: watch::Sender<ConnectionStatus>,
}

impl<T: OperatorTransport> Connector<T> {
    /// Create a connector.
    pub fn new(transport: T, config: ConnectConfig) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            transport,
            config,
            in_flight: Mutex::new(()),
            status,
        }
    }

    /// Get the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Current status.
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Whether registration has succeeded.
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Register with the operator at `url`, retrying until accepted.
    ///
    /// Returns immediately if already connected. A caller arriving while
    /// another registration is in flight waits for it instead of sending
    /// its own.
    pub async fn connect(&self, url: &str, registration: &str) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let _guard = self.in_flight.lock().await;
        if self.is_connected() {
            return Ok(());
        }

        let mut attempt: u32 = 0;
        loop {
            self.status.send_replace(ConnectionStatus::Connecting { attempt });
            info!(attempt, url, "registering with operator");

            match self.transport.post_jwt(url, registration).await {
                Ok(_) => {
                    self.status.send_replace(ConnectionStatus::Connected);
                    info!(attempt, url, "registered with operator");
                    return Ok(());
                }
                Err(error) => {
                    let attempts = attempt.saturating_add(1);
                    if self.config.max_attempts.is_some_and(|max| attempts >= max) {
                        self.status.send_replace(ConnectionStatus::Disconnected);
                        warn!(attempts, %error, "giving up on operator registration");
                        return Err(OperatorError::RetriesExhausted { attempts });
                    }

                    let delay = self.config.delay_for(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %error,
                        "operator registration failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = attempts;
                }
            }
        }
    }
}

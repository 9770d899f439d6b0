//! # Consent Kernel Operator
//!
//! Everything the kernel exchanges with the operator and the subject's
//! account app, minus the HTTP stack itself.
//!
//! ## Key Types
//!
//! - [`Claims`] - signed claim sets, tagged by `type`
//! - [`OperatorEvent`] - bodies delivered to the client's events endpoint
//! - [`OperatorTransport`] - POSTs a JWT somewhere and returns the body
//! - [`Connector`] - single-flight registration with capped exponential backoff
//!
//! ## Handshake
//!
//! ```text
//! Client                 Operator             Account app
//!   |-- SERVICE_REGISTRATION -->|                    |
//!   |<------------------- CONNECTION_INIT -----------|
//!   |-------------------- CONNECTION_REQUEST ------->|
//!   |<------------------- CONNECTION_EVENT ----------|
//! ```
//!
//! Registration is retried forever by default with delays of
//! `min(1000 * 2^attempt, 5000)` ms.

pub mod error;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use error::{OperatorError, Result};
pub use messages::{
    authentication_url, AccessToken, AuthenticationRequest, Claims, Connection, ConnectionInit,
    ConnectionRequest, ConsentRequest, OperatorEvent, ServiceRegistration, SignedPayload,
    ACCOUNT_AUDIENCE,
};
pub use protocol::{ConnectConfig, ConnectionStatus, Connector};
pub use transport::{memory::MemoryTransport, OperatorTransport, JWT_CONTENT_TYPE};

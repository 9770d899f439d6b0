//! Transport abstraction for talking to the operator.
//!
//! Every outbound message is a signed JWT POSTed with content type
//! `application/jwt`. Implementations may use any HTTP stack; the kernel
//! only needs [`OperatorTransport::post_jwt`].

use async_trait::async_trait;

use crate::error::Result;

/// Content type of every outbound message.
pub const JWT_CONTENT_TYPE: &str = "application/jwt";

/// Transport trait for delivering signed tokens.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait OperatorTransport: Send + Sync {
    /// POST `token` to `url` and return the response body.
    async fn post_jwt(&self, url: &str, token: &str) -> Result<String>;
}

#[async_trait]
impl<T: OperatorTransport + ?Sized> OperatorTransport for std::sync::Arc<T> {
    async fn post_jwt(&self, url: &str, token: &str) -> Result<String> {
        (**self).post_jwt(url, token).await
    }
}

/// A scripted in-memory transport for testing.
///
/// Records every request and fails a configurable number of times before
/// succeeding, or refuses every request like an operator answering 4xx.
pub mod memory {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use tokio::sync::Mutex;

    use crate::error::OperatorError;

    /// A request seen by the transport.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentRequest {
        pub url: String,
        pub token: String,
    }

    /// In-memory transport implementation.
    #[derive(Default)]
    pub struct MemoryTransport {
        failures_left: AtomicU32,
        latency: Option<Duration>,
        rejection: Option<(u16, String)>,
        response: String,
        sent: Mutex<Vec<SentRequest>>,
    }

    impl MemoryTransport {
        /// A transport where every request succeeds.
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the first `n` requests with a transport error.
        pub fn failing(n: u32) -> Self {
            Self {
                failures_left: AtomicU32::new(n),
                ..Self::default()
            }
        }

        /// Refuse every request with `status` once any scripted failures are used up.
        pub fn rejecting(status: u16, message: impl Into<String>) -> Self {
            Self {
                rejection: Some((status, message.into())),
                ..Self::default()
            }
        }

        /// Delay every request by `latency`.
        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = Some(latency);
            self
        }

        /// Body returned by successful requests.
        pub fn with_response(mut self, response: impl Into<String>) -> Self {
            self.response = response.into();
            self
        }

        /// Every request seen so far, failed ones included.
        pub async fn sent(&self) -> Vec<SentRequest> {
            self.sent.lock().await.clone()
        }

        /// Number of requests seen so far.
        pub async fn attempts(&self) -> usize {
            self.sent.lock().await.len()
        }
    }

    #[async_trait]
    impl OperatorTransport for MemoryTransport {
        async fn post_jwt(&self, url: &str, token: &str) -> Result<String> {
            self.sent.lock().await.push(SentRequest {
                url: url.to_string(),
                token: token.to_string(),
            });

            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }

            let failed = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                return Err(OperatorError::TransportError("connection refused".into()));
            }
            if let Some((status, message)) = &self.rejection {
                return Err(OperatorError::Rejected {
                    status: *status,
                    message: message.clone(),
                });
            }
            Ok(self.response.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryTransport;
    use super::*;
    use crate::error::OperatorError;

    #[tokio::test]
    async fn test_memory_transport_fails_then_succeeds() {
        let transport = MemoryTransport::failing(2).with_response("ok");

        assert!(transport.post_jwt("http://op/api", "t").await.is_err());
        assert!(transport.post_jwt("http://op/api", "t").await.is_err());
        assert_eq!(transport.post_jwt("http://op/api", "t").await.unwrap(), "ok");

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].url, "http://op/api");
        assert_eq!(sent[0].token, "t");
    }

    #[tokio::test]
    async fn test_memory_transport_rejects() {
        let transport = MemoryTransport::rejecting(403, "unknown client");

        let err = transport.post_jwt("http://op/api", "t").await.unwrap_err();
        assert!(matches!(
            &err,
            OperatorError::Rejected { status: 403, message } if message == "unknown client"
        ));
        assert_eq!(err.to_string(), "operator rejected request (403): unknown client");
        assert_eq!(transport.attempts().await, 1);
    }
}

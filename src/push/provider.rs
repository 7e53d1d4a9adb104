//! Seam to the external push delivery provider.
//!
//! The provider is a black box: `send(token, payload) -> ok | err`. The
//! fan-out engine treats every token's dispatch as an independent task, so
//! the trait's only failure nuance is permanent-vs-transient: a permanent
//! rejection means the token is dead and gets soft-revoked.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Payload handed to the provider for one device.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    /// Deep link plus the event's typed refs, forwarded as provider data.
    pub data: serde_json::Value,
}

#[derive(Error, Debug)]
pub enum PushError {
    /// The provider rejected the token permanently (expired, unregistered).
    #[error("token rejected: {0}")]
    Rejected(String),

    /// Transient failure (network, provider outage). The token stays active;
    /// delivery is best-effort and not retried within this core.
    #[error("transient push failure: {0}")]
    Transient(String),
}

#[async_trait]
pub trait PushProvider: Send + Sync {
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<(), PushError>;
}

/// Default provider wired in main: logs the dispatch and reports success.
/// Deployments supply a real provider behind the same trait.
pub struct LogPushProvider;

#[async_trait]
impl PushProvider for LogPushProvider {
    async fn send(&self, token: &str, payload: &PushPayload) -> Result<(), PushError> {
        tracing::info!(
            token = %token,
            title = %payload.title,
            "push dispatch (log-only provider)"
        );
        Ok(())
    }
}

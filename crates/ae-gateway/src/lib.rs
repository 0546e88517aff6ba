//! Remote command gateway.
//!
//! Every call into the native backend goes through [`Gateway`], which turns
//! transport errors and undecodable payloads into
//! [`BackendResponse::Failure`] so callers only ever branch on the envelope.

pub mod mock;
mod services;

pub use services::{AeroeApi, NodeApi, TermsApi, VaultApi, WalletApi};

use ae_api_types::{BackendError, BackendResponse};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("backend HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed backend payload: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("backend rejected command")]
    Rejected(Value),
}

impl From<TransportError> for BackendError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Rejected(payload) => BackendError(payload),
            other => BackendError::message(other.to_string()),
        }
    }
}

/// Seam to the native backend process.
#[async_trait]
pub trait CommandTransport: Send + Sync {
    async fn invoke(&self, command: &str, args: Option<Value>) -> Result<Value, TransportError>;
}

#[derive(Clone)]
pub struct Gateway {
    transport: Arc<dyn CommandTransport>,
}

impl Gateway {
    pub fn new(transport: Arc<dyn CommandTransport>) -> Self {
        Self { transport }
    }

    /// Invoke `command` and decode its payload as `T`. Never fails past the envelope.
    pub async fn invoke<T: DeserializeOwned>(&self, command: &str, args: Option<Value>) -> BackendResponse<T> {
        let response = self
            .transport
            .invoke(command, args)
            .await
            .map_err(BackendError::from)
            .and_then(|payload| {
                serde_json::from_value::<T>(payload)
                    .map_err(|err| BackendError::from(TransportError::Decode(err)))
            });

        match response {
            Ok(data) => BackendResponse::Success(data),
            Err(err) => {
                warn!(command, error = %err, "backend command failed");
                BackendResponse::Failure(err)
            }
        }
    }

    pub async fn invoke_with<A, T>(&self, command: &str, args: &A) -> BackendResponse<T>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        match serde_json::to_value(args) {
            Ok(args) => self.invoke(command, Some(args)).await,
            Err(err) => BackendResponse::Failure(TransportError::Decode(err).into()),
        }
    }

    /// Canned failure for commands the backend does not expose yet.
    pub fn not_implemented<T>() -> BackendResponse<T> {
        BackendResponse::Failure(BackendError::not_implemented())
    }

    pub fn terms(&self) -> TermsApi<'_> {
        TermsApi::new(self)
    }

    pub fn aeroe(&self) -> AeroeApi<'_> {
        AeroeApi::new(self)
    }

    pub fn vault(&self) -> VaultApi<'_> {
        VaultApi::new(self)
    }

    pub fn wallet(&self) -> WalletApi<'_> {
        WalletApi::new(self)
    }

    pub fn node(&self) -> NodeApi<'_> {
        NodeApi::new(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedTransport(Result<Value, fn() -> TransportError>);

    #[async_trait]
    impl CommandTransport for FixedTransport {
        async fn invoke(&self, _command: &str, _args: Option<Value>) -> Result<Value, TransportError> {
            match &self.0 {
                Ok(value) => Ok(value.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn gateway(result: Result<Value, fn() -> TransportError>) -> Gateway {
        Gateway::new(Arc::new(FixedTransport(result)))
    }

    #[tokio::test]
    async fn rejected_command_keeps_backend_payload() {
        let gateway = gateway(Err(|| TransportError::Rejected(json!({ "code": 7 }))));
        let response: BackendResponse<bool> = gateway.invoke("terms_of_use_is_accepted", None).await;
        assert_eq!(response.error(), Some(&BackendError(json!({ "code": 7 }))));
    }

    #[tokio::test]
    async fn transport_failure_becomes_failure_envelope() {
        let gateway = gateway(Err(|| TransportError::Transport("connection refused".to_owned())));
        let response: BackendResponse<()> = gateway.invoke("vault_load", None).await;
        let message = response.error().map(ToString::to_string).unwrap_or_default();
        assert!(message.contains("connection refused"));
    }

    #[tokio::test]
    async fn wrong_payload_shape_is_a_failure() {
        let gateway = gateway(Ok(json!("not-a-bool")));
        let response: BackendResponse<bool> = gateway.invoke("terms_of_use_is_accepted", None).await;
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn null_payload_decodes_as_unit() {
        let gateway = gateway(Ok(Value::Null));
        let response: BackendResponse<()> = gateway.invoke("accept_terms_of_use", None).await;
        assert!(response.is_success());
    }

    #[test]
    fn not_implemented_is_a_failure() {
        let response: BackendResponse<Value> = Gateway::not_implemented();
        assert!(response.error().is_some_and(BackendError::is_not_implemented));
    }
}

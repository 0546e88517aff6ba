use ae_api_types::BackendResponse;
use ae_gateway::{CommandTransport, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:1430";

/// HTTP bridge to the native backend process.
///
/// Reads `AEROE_BACKEND_URL` from environment at construction time
/// (default: `http://127.0.0.1:1430`). Each command is posted to
/// `{endpoint}/invoke/{command}` and answered with a
/// `{success, data, error}` envelope.
pub struct HttpTransport {
    endpoint: String,
    http: reqwest::Client,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl HttpTransport {
    pub fn new(endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("AEROE_BACKEND_URL").ok())
            .unwrap_or_else(|| DEFAULT_BACKEND_URL.to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url_for(&self, command: &str) -> String {
        format!("{}/invoke/{}", self.endpoint, command)
    }
}

#[async_trait]
impl CommandTransport for HttpTransport {
    async fn invoke(&self, command: &str, args: Option<Value>) -> Result<Value, TransportError> {
        let url = self.url_for(command);
        debug!(command, %url, "invoking backend command");

        let response = self
            .http
            .post(&url)
            .json(&args.unwrap_or_else(|| Value::Object(Default::default())))
            .send()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| TransportError::Transport(err.to_string()))?;

        if !status.is_success() {
            // The backend still answers with an envelope on command errors.
            if let Ok(BackendResponse::Failure(err)) = serde_json::from_str::<BackendResponse<Value>>(&text) {
                return Err(TransportError::Rejected(err.0));
            }
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        unwrap_envelope(&text)
    }
}

fn unwrap_envelope(text: &str) -> Result<Value, TransportError> {
    match serde_json::from_str::<BackendResponse<Value>>(text)? {
        BackendResponse::Success(data) => Ok(data),
        BackendResponse::Failure(err) => Err(TransportError::Rejected(err.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ae_gateway::Gateway;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn endpoint_is_normalized() {
        let transport = HttpTransport::new(Some("http://localhost:9000/".to_owned()));
        assert_eq!(transport.endpoint(), "http://localhost:9000");
        assert_eq!(transport.url_for("aeroe_status"), "http://localhost:9000/invoke/aeroe_status");
    }

    #[test]
    fn envelope_success_yields_data() {
        let data = unwrap_envelope(r#"{"success":true,"data":["alice"]}"#).unwrap();
        assert_eq!(data, json!(["alice"]));
    }

    #[test]
    fn envelope_failure_is_rejected() {
        let err = unwrap_envelope(r#"{"success":false,"error":"wallet not found"}"#).unwrap_err();
        assert!(matches!(err, TransportError::Rejected(Value::String(ref msg)) if msg == "wallet not found"));
    }

    #[test]
    fn garbage_body_is_decode_error() {
        let err = unwrap_envelope("<html>").unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_failure_envelope() {
        let transport = HttpTransport::new(Some("http://127.0.0.1:1".to_owned()));
        let gateway = Gateway::new(Arc::new(transport));
        let response = gateway.aeroe().status().await;
        assert!(!response.is_success());
    }
}

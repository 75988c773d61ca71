//! HTTP client for webhook delivery with a bounded timeout.
//!
//! Handles request construction and response capture. Classification of the
//! response (success, retryable, permanent) is the worker's concern; the
//! client only distinguishes "a response arrived" from transport failure.

use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{DeliveryError, Result};

/// Response bodies are kept for the audit trail, truncated to this length.
const MAX_STORED_BODY_CHARS: usize = 4000;

/// Configuration for the webhook delivery client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Request timeout; expiry is a transient failure subject to retry.
    pub timeout: Duration,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: "Slotwise-Webhook-Delivery/1.0".to_string(),
        }
    }
}

/// One outbound webhook POST.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    /// Destination URL.
    pub url: String,
    /// Signed request body.
    pub body: Bytes,
    /// Idempotency key header value.
    pub idempotency_key: String,
    /// Signature header name.
    pub signature_header: String,
    /// Signature header value (`sha256=<hex>`).
    pub signature: String,
}

/// Captured response from a delivery attempt.
#[derive(Debug, Clone)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status_code: u16,
    /// Response body, truncated for storage.
    pub body: String,
    /// Whether the status was 2xx.
    pub is_success: bool,
}

/// HTTP client for webhook delivery.
///
/// Connection pooling comes from the underlying `reqwest` client; one
/// instance is shared by all workers.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl WebhookClient {
    /// Creates a client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built with the provided settings.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a client with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// Posts a signed webhook body to the endpoint.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` when the bounded timeout expires and `Network` for
    /// connection-level failures. Responses of any HTTP status are `Ok`; the
    /// caller classifies them.
    pub async fn post(&self, request: WebhookRequest) -> Result<WebhookResponse> {
        debug!(url = %request.url, idempotency_key = %request.idempotency_key, "posting webhook");

        let response = self
            .client
            .post(&request.url)
            .header("content-type", "application/json")
            .header("idempotency-key", &request.idempotency_key)
            .header(&request.signature_header, &request.signature)
            .body(request.body)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                warn!(url = %request.url, error = %e, "webhook request failed");
                if e.is_timeout() {
                    return Err(DeliveryError::timeout(self.config.timeout.as_secs()));
                }
                if e.is_connect() {
                    return Err(DeliveryError::network(format!("connection failed: {e}")));
                }
                return Err(DeliveryError::network(e.to_string()));
            },
        };

        let status_code = response.status().as_u16();
        let is_success = response.status().is_success();

        let body = match response.text().await {
            Ok(text) => truncate_body(&text),
            Err(e) => {
                warn!(error = %e, "failed to read response body");
                format!("[failed to read response body: {e}]")
            },
        };

        debug!(status = status_code, "webhook response received");

        Ok(WebhookResponse { status_code, body, is_success })
    }
}

/// Truncates a response body to the audit storage limit.
fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_STORED_BODY_CHARS {
        return body.to_string();
    }
    let mut truncated: String = body.chars().take(MAX_STORED_BODY_CHARS).collect();
    truncated.push_str("... (truncated)");
    truncated
}

#[cfg(test)]
mod tests {
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn test_request(url: String) -> WebhookRequest {
        WebhookRequest {
            url,
            body: Bytes::from_static(br#"{"probe":true}"#),
            idempotency_key: "appointment:test:created".to_string(),
            signature_header: "X-Webhook-Signature".to_string(),
            signature: "sha256=deadbeef".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_post_returns_response() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/webhook"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
            .mount(&server)
            .await;

        let client = WebhookClient::with_defaults().unwrap();
        let response = client.post(test_request(format!("{}/webhook", server.uri()))).await.unwrap();

        assert_eq!(response.status_code, 200);
        assert!(response.is_success);
        assert_eq!(response.body, "OK");
    }

    #[tokio::test]
    async fn required_headers_are_attached() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::header("content-type", "application/json"))
            .and(matchers::header("idempotency-key", "appointment:test:created"))
            .and(matchers::header("X-Webhook-Signature", "sha256=deadbeef"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = WebhookClient::with_defaults().unwrap();
        let result = client.post(test_request(server.uri())).await;
        assert!(result.is_ok());

        server.verify().await;
    }

    #[tokio::test]
    async fn non_success_statuses_are_responses_not_errors() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let client = WebhookClient::with_defaults().unwrap();
        let response = client.post(test_request(server.uri())).await.unwrap();

        assert_eq!(response.status_code, 503);
        assert!(!response.is_success);
        assert_eq!(response.body, "maintenance");
    }

    #[tokio::test]
    async fn connection_failure_is_a_network_error() {
        // Nothing listens on this port.
        let client = WebhookClient::with_defaults().unwrap();
        let result = client.post(test_request("http://127.0.0.1:9/webhook".to_string())).await;

        assert!(matches!(result, Err(DeliveryError::Network { .. })));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let long = "x".repeat(5000);
        let stored = truncate_body(&long);
        assert!(stored.len() < long.len());
        assert!(stored.ends_with("... (truncated)"));

        assert_eq!(truncate_body("short"), "short");
    }
}

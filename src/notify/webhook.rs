use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Longest slice of a rejecting sink's response body kept for diagnostics
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Errors from a single delivery attempt.
///
/// Messages never include the endpoint URL: webhook URLs embed their secret.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Webhook request failed: {0}")]
    Network(#[source] reqwest::Error),
    #[error("Webhook request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Webhook rejected message: status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Delivers a text message to the configured sink.
///
/// One call is one attempt. Callers decide whether a failure matters.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), DeliveryError>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    text: &'a str,
}

/// Posts `{"text": ...}` to an incoming-webhook endpoint (Slack style).
pub struct WebhookNotifier {
    client: reqwest::Client,
    endpoint: SecretString,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, endpoint: SecretString, timeout: Duration) -> Self {
        Self {
            client,
            endpoint,
            timeout,
        }
    }

    /// POST `message` to `endpoint`. Any non-2xx status is a failure.
    ///
    /// The whole attempt, including reading a rejection body, shares one
    /// deadline of `timeout`.
    pub async fn send(&self, endpoint: &str, message: &str) -> Result<(), DeliveryError> {
        let deadline = Instant::now() + self.timeout;
        let request = self
            .client
            .post(endpoint)
            .json(&WebhookPayload { text: message })
            .send();

        let response = tokio::time::timeout_at(deadline, request)
            .await
            .map_err(|_| DeliveryError::Timeout(self.timeout))?
            .map_err(|e| DeliveryError::Network(e.without_url()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(status = status.as_u16(), "Webhook accepted message");
            return Ok(());
        }

        // A body that stalls past the deadline is dropped; the status is what matters
        let body = match tokio::time::timeout_at(deadline, response.text()).await {
            Ok(text) => text.unwrap_or_default(),
            Err(_) => {
                tracing::debug!(status = status.as_u16(), "Timed out reading rejection body");
                String::new()
            }
        };
        Err(DeliveryError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }
}

impl std::fmt::Debug for WebhookNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookNotifier")
            .field("endpoint", &"[REDACTED]")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, message: &str) -> Result<(), DeliveryError> {
        self.send(self.endpoint.expose_secret(), message).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notifier_for(server: &MockServer) -> WebhookNotifier {
        WebhookNotifier::new(
            reqwest::Client::new(),
            SecretString::from(format!("{}/services/T000/B000/secret", server.uri())),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_posts_json_text_payload() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/services/T000/B000/secret"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({ "text": "hello\nworld" })))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&mock_server)
            .await;

        notifier_for(&mock_server).notify("hello\nworld").await.unwrap();
    }

    #[tokio::test]
    async fn test_any_2xx_is_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        assert!(notifier_for(&mock_server).notify("hi").await.is_ok());
    }

    #[tokio::test]
    async fn test_non_2xx_is_rejected_with_status_and_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid_token"))
            .expect(1)
            .mount(&mock_server)
            .await;

        match notifier_for(&mock_server).notify("hi").await.unwrap_err() {
            DeliveryError::Rejected { status, body } => {
                assert_eq!(status, 403);
                assert_eq!(body, "invalid_token");
            }
            e => panic!("Expected Rejected, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_rejected_body_is_truncated() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("x".repeat(5000)))
            .mount(&mock_server)
            .await;

        match notifier_for(&mock_server).notify("hi").await.unwrap_err() {
            DeliveryError::Rejected { body, .. } => assert_eq!(body.len(), MAX_ERROR_BODY_CHARS),
            e => panic!("Expected Rejected, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_slow_sink_times_out() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&mock_server)
            .await;

        let notifier = WebhookNotifier::new(
            reqwest::Client::new(),
            SecretString::from(format!("{}/hook", mock_server.uri())),
            Duration::from_millis(200),
        );
        let err = notifier.notify("hi").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_stalled_rejection_body_is_bounded_by_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Sends an error status and part of the promised body, then goes quiet
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 100\r\n\r\npartial")
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let notifier = WebhookNotifier::new(
            reqwest::Client::new(),
            SecretString::from(format!("http://{addr}/hook")),
            Duration::from_millis(200),
        );
        let outcome = tokio::time::timeout(Duration::from_secs(3), notifier.notify("hi"))
            .await
            .expect("notify must return within its own timeout");

        match outcome.unwrap_err() {
            DeliveryError::Rejected { status, .. } => assert_eq!(status, 500),
            e => panic!("Expected Rejected, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_send_to_explicit_endpoint() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/other"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let notifier = notifier_for(&mock_server);
        notifier
            .send(&format!("{}/other", mock_server.uri()), "hi")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_network_error_hides_endpoint() {
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };
        let notifier = WebhookNotifier::new(
            reqwest::Client::new(),
            SecretString::from(format!("{uri}/services/very-secret-token")),
            Duration::from_secs(5),
        );

        let err = notifier.notify("hi").await.unwrap_err();
        assert!(matches!(err, DeliveryError::Network(_)));
        assert!(!err.to_string().contains("very-secret-token"));
    }

    #[test]
    fn test_debug_masks_endpoint() {
        let notifier = WebhookNotifier::new(
            reqwest::Client::new(),
            SecretString::from("https://hooks.example.com/secret-path".to_string()),
            Duration::from_secs(5),
        );
        let debug_output = format!("{:?}", notifier);
        assert!(!debug_output.contains("secret-path"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}

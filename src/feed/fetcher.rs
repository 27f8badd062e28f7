use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use thiserror::Error;

const MAX_FEED_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Errors that can occur while retrieving the feed body.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// Request exceeded the configured timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Retrieves the raw text of a feed.
///
/// One call is one outbound request. Retrying is left to the caller.
#[async_trait]
pub trait FeedFetcher: Send + Sync {
    async fn fetch(&self) -> Result<String, FetchError>;
}

/// Fetches a fixed feed URL over HTTP.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpFeedFetcher {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    /// Fetches the feed body.
    ///
    /// # Errors
    ///
    /// - [`FetchError::Network`] - Connection or TLS errors
    /// - [`FetchError::Timeout`] - No response within the configured timeout
    /// - [`FetchError::HttpStatus`] - Non-2xx HTTP response
    /// - [`FetchError::ResponseTooLarge`] - Body exceeded 10MB
    /// - [`FetchError::IncompleteResponse`] - Body shorter than Content-Length
    async fn fetch(&self) -> Result<String, FetchError> {
        tracing::debug!(url = %self.url, "Fetching feed");

        let bytes = tokio::time::timeout(self.timeout, async {
            let response = self.client.get(&self.url).send().await?;

            if !response.status().is_success() {
                return Err(FetchError::HttpStatus(response.status().as_u16()));
            }

            read_limited_bytes(response, MAX_FEED_SIZE).await
        })
        .await
        .map_err(|_| FetchError::Timeout(self.timeout))??;

        tracing::debug!(url = %self.url, bytes = bytes.len(), "Feed fetched");

        // Lossy decode: one bad byte should not cost the whole feed
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    // Fast path: check Content-Length header
    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VALID_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
    <item><title>Test</title><link>https://example.com/1</link></item>
</channel></rss>"#;

    fn fetcher_for(server: &MockServer) -> HttpFeedFetcher {
        HttpFeedFetcher::new(
            reqwest::Client::new(),
            format!("{}/feed.xml", server.uri()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_fetch_success_returns_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .insert_header("Content-Type", "application/xml"),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let body = fetcher_for(&mock_server).fetch().await.unwrap();
        assert_eq!(body, VALID_RSS);
    }

    #[tokio::test]
    async fn test_fetch_404_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        match fetcher_for(&mock_server).fetch().await.unwrap_err() {
            FetchError::HttpStatus(404) => {}
            e => panic!("Expected HttpStatus(404), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_500_is_not_retried() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&mock_server)
            .await;

        match fetcher_for(&mock_server).fetch().await.unwrap_err() {
            FetchError::HttpStatus(500) => {}
            e => panic!("Expected HttpStatus(500), got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(VALID_RSS)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let fetcher = HttpFeedFetcher::new(
            reqwest::Client::new(),
            format!("{}/feed.xml", mock_server.uri()),
            Duration::from_millis(50),
        );

        match fetcher.fetch().await.unwrap_err() {
            FetchError::Timeout(_) => {}
            e => panic!("Expected Timeout, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_body_is_ok() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let body = fetcher_for(&mock_server).fetch().await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_invalid_utf8_is_decoded_lossily() {
        let mock_server = MockServer::start().await;
        let mut raw = b"<item><title>caf".to_vec();
        raw.push(0xff);
        raw.extend_from_slice(b"</title></item>");
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(raw))
            .mount(&mock_server)
            .await;

        let body = fetcher_for(&mock_server).fetch().await.unwrap();
        assert!(body.starts_with("<item><title>caf"));
        assert!(body.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        // Bind then drop a server so the port is closed
        let uri = {
            let server = MockServer::start().await;
            server.uri()
        };
        let fetcher = HttpFeedFetcher::new(
            reqwest::Client::new(),
            format!("{uri}/feed.xml"),
            Duration::from_secs(5),
        );

        match fetcher.fetch().await.unwrap_err() {
            FetchError::Network(_) => {}
            e => panic!("Expected Network error, got {:?}", e),
        }
    }
}

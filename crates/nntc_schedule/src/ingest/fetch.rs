//! Download of the published schedule document.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::error::IngestError;

const USER_AGENT: &str = concat!("nntc_schedule/", env!("CARGO_PKG_VERSION"));

/// HTTP client for the schedule download link.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    client: Client,
    url: String,
}

impl DocumentSource {
    /// `timeout` bounds the whole request, body included.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, IngestError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Fetch {
                message: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// GETs the document and buffers the whole body.
    pub async fn fetch(&self) -> Result<Vec<u8>, IngestError> {
        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(IngestError::Fetch {
                message: format!("{} returned status {}", self.url, response.status()),
            });
        }

        let bytes = response.bytes().await?;
        debug!(url = %self.url, bytes = bytes.len(), "Downloaded schedule document");

        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/download"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let source =
            DocumentSource::new(format!("{}/download", server.uri()), Duration::from_secs(5))
                .unwrap();
        assert_eq!(source.fetch().await.unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_http_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = DocumentSource::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, IngestError::Fetch { .. }));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let source = DocumentSource::new(server.uri(), Duration::from_millis(200)).unwrap();
        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, IngestError::Fetch { .. }));
    }
}

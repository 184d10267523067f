//! HTTP profile feed client
//!
//! Fetches the FriendFace document with a single GET and decodes it in one
//! pass. Nothing is retried here; a failed fetch is reported to the caller
//! and the local cache is left untouched.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::domain::result::{Error, FetchError, Result};
use crate::domain::transfer::decode_users;
use crate::domain::TransferUser;
use crate::ports::ProfileSource;

/// Public FriendFace sample feed
pub const DEFAULT_ENDPOINT: &str = "https://www.hackingwithswift.com/samples/friendface.json";

/// Parse and vet a feed endpoint
///
/// HTTPS is required, except for loopback hosts where plain HTTP is allowed.
pub fn validate_endpoint(endpoint: &str) -> Result<Url> {
    let parsed = Url::parse(endpoint)
        .map_err(|e| Error::config(format!("Invalid endpoint URL '{}': {}", endpoint, e)))?;

    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if is_loopback(&parsed) => Ok(parsed),
        "http" => Err(Error::config(format!(
            "Endpoint must use HTTPS: {}",
            endpoint
        ))),
        other => Err(Error::config(format!(
            "Unsupported endpoint scheme '{}': {}",
            other, endpoint
        ))),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(url::Host::Domain(host)) => host.eq_ignore_ascii_case("localhost"),
        Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
        Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}

/// Remote fetcher backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpProfileSource {
    client: Client,
    endpoint: Url,
}

impl HttpProfileSource {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = validate_endpoint(endpoint)?;
        let client = Client::builder()
            .user_agent(concat!("friendface/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    /// Fetch and decode the whole feed document
    pub async fn fetch_users(&self) -> std::result::Result<Vec<TransferUser>, FetchError> {
        debug!(endpoint = %self.endpoint, "fetching profile feed");

        let response = self
            .client
            .get(self.endpoint.clone())
            .send()
            .await
            .map_err(map_request_error)?;

        check_response_status(&response)?;

        let body = response.bytes().await.map_err(map_request_error)?;
        let users = decode_users(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        debug!(users = users.len(), bytes = body.len(), "profile feed decoded");
        Ok(users)
    }
}

#[async_trait]
impl ProfileSource for HttpProfileSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> std::result::Result<Vec<TransferUser>, FetchError> {
        self.fetch_users().await
    }
}

/// Map transport errors to user-facing messages
fn map_request_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Network("Connection timed out".to_string())
    } else if error.is_connect() {
        FetchError::Network(format!("Unable to connect to profile feed: {}", error))
    } else {
        FetchError::Network(format!("Profile feed request failed: {}", error))
    }
}

fn check_response_status(response: &reqwest::Response) -> std::result::Result<(), FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(FetchError::Status(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::feed_mock::{generate_mock_users, MockFeedConfig, MockFeedServer};

    #[test]
    fn test_validate_endpoint_accepts_https() {
        assert!(validate_endpoint(DEFAULT_ENDPOINT).is_ok());
    }

    #[test]
    fn test_validate_endpoint_allows_loopback_http() {
        assert!(validate_endpoint("http://127.0.0.1:8080/feed.json").is_ok());
        assert!(validate_endpoint("http://localhost/feed.json").is_ok());
        assert!(validate_endpoint("http://[::1]:9000/").is_ok());
    }

    #[test]
    fn test_validate_endpoint_rejects_plain_http_and_garbage() {
        assert!(validate_endpoint("http://example.com/feed.json").is_err());
        assert!(validate_endpoint("ftp://example.com/feed.json").is_err());
        assert!(validate_endpoint("not a url").is_err());
    }

    #[tokio::test]
    async fn test_fetch_decodes_feed() {
        let server = MockFeedServer::start(MockFeedConfig::default()).unwrap();
        let source = HttpProfileSource::new(&server.url()).unwrap();

        let users = source.fetch().await.unwrap();
        assert_eq!(users, generate_mock_users(3));
        assert_eq!(source.name(), "http");
    }

    #[tokio::test]
    async fn test_fetch_reports_status() {
        let server = MockFeedServer::start(MockFeedConfig::failing(503)).unwrap();
        let source = HttpProfileSource::new(&server.url()).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert_eq!(err, FetchError::Status(503));
    }

    #[tokio::test]
    async fn test_fetch_reports_decode_failure() {
        let server =
            MockFeedServer::start(MockFeedConfig::with_body(r#"[{"id": "1"}]"#)).unwrap();
        let source = HttpProfileSource::new(&server.url()).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_reports_network_failure() {
        // Bind and immediately drop to get a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let source =
            HttpProfileSource::new(&format!("http://127.0.0.1:{}/feed.json", port)).unwrap();

        let err = source.fetch().await.unwrap_err();
        assert!(matches!(err, FetchError::Network(_)));
    }
}

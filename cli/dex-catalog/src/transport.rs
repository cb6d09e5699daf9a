//! The "fetch JSON at URL" capability the fetcher is built on.

use std::fmt::Debug;
use std::future::Future;
use std::str::FromStr;

use reqwest::header::{self, HeaderMap};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::config::CatalogClientConfig;
use crate::error::{CatalogClientError, TransportError};
use crate::mock::MockTransport;

/// Retrieves and parses a JSON document.
///
/// Implementations must stop working on the request and return
/// [TransportError::Cancelled] once `cancel` fires.
pub trait JsonTransport {
    fn fetch_json(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Value, TransportError>> + Send;
}

/// Either an HTTP transport for the actual catalog service,
/// or a mock transport for testing.
#[derive(Debug, Clone)]
pub enum Transport {
    Http(HttpTransport),
    Mock(MockTransport),
}

impl From<HttpTransport> for Transport {
    fn from(transport: HttpTransport) -> Self {
        Transport::Http(transport)
    }
}

impl From<MockTransport> for Transport {
    fn from(transport: MockTransport) -> Self {
        Transport::Mock(transport)
    }
}

impl JsonTransport for Transport {
    async fn fetch_json(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, TransportError> {
        match self {
            Transport::Http(transport) => transport.fetch_json(url, cancel).await,
            Transport::Mock(transport) => transport.fetch_json(url, cancel).await,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// A reqwest based transport for the catalog service.
///
/// Handles:
/// - HTTP client configuration with timeouts
/// - Extra default headers and user agent
/// - Cancellation of in-flight requests
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: CatalogClientConfig,
}

impl Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("catalog_url", &self.config.catalog_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(config: CatalogClientConfig) -> Result<Self, CatalogClientError> {
        let client = build_http_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CatalogClientConfig {
        &self.config
    }
}

impl JsonTransport for HttpTransport {
    async fn fetch_json(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, TransportError> {
        let parsed = Url::parse(url).map_err(|source| TransportError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        let request = async {
            trace!(%url, "sending request");
            let response = self.client.get(parsed).send().await.map_err(|source| {
                TransportError::Request {
                    url: url.to_string(),
                    source,
                }
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    url: url.to_string(),
                    status,
                });
            }

            response
                .json::<Value>()
                .await
                .map_err(|source| TransportError::Decode {
                    url: url.to_string(),
                    source,
                })
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled { url: url.to_string() }),
            result = request => result,
        }
    }
}

/// Build the HTTP client used for every catalog request.
fn build_http_client(config: &CatalogClientConfig) -> Result<reqwest::Client, CatalogClientError> {
    let mut headers = HeaderMap::new();

    headers.insert(
        header::ACCEPT,
        header::HeaderValue::from_static("application/json"),
    );

    for (key, value) in &config.extra_headers {
        headers.insert(
            header::HeaderName::from_str(key)
                .map_err(|_| CatalogClientError::InvalidHeader { name: key.clone() })?,
            header::HeaderValue::from_str(value)
                .map_err(|_| CatalogClientError::InvalidHeader { name: key.clone() })?,
        );
    }

    debug!(
        catalog_url = %config.catalog_url,
        extra_headers = config.extra_headers.len(),
        "building catalog HTTP client"
    );

    let client_builder = reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(config.connect_timeout)
        .timeout(config.timeout);

    let client_builder = if let Some(ref user_agent) = config.user_agent {
        client_builder.user_agent(user_agent)
    } else {
        client_builder
    };

    client_builder.build().map_err(CatalogClientError::Build)
}

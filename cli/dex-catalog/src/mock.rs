//! Canned-response transport for tests and offline runs.
//!
//! Responses are keyed by the exact URL string the fetcher requests.
//! They are not consumed, so a retried page sees the same answer.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TransportError;
use crate::transport::JsonTransport;

/// Environment variable pointing at a JSON file of mock responses.
pub const DEX_CATALOG_MOCK_DATA_VAR: &str = "DEX_CATALOG_MOCK_DATA";

// Arc allows you to push things into the transport from outside if necessary
// Mutex allows you to share across threads (necessary because of tokio)
type MockField<T> = Arc<Mutex<T>>;

/// A single canned answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MockResponse {
    Json {
        body: Value,
        #[serde(default, skip_serializing_if = "is_zero")]
        delay_ms: u64,
    },
    Failure {
        error: String,
        #[serde(default, skip_serializing_if = "is_zero")]
        delay_ms: u64,
    },
}

fn is_zero(value: &u64) -> bool {
    *value == 0
}

impl MockResponse {
    fn delay(&self) -> Duration {
        match self {
            MockResponse::Json { delay_ms, .. } | MockResponse::Failure { delay_ms, .. } => {
                Duration::from_millis(*delay_ms)
            },
        }
    }
}

#[derive(Debug, Error)]
pub enum MockDataError {
    /// Failed to read the JSON file pointed at by the DEX_CATALOG_MOCK_DATA var
    #[error("failed to read mock response file")]
    ReadMockFile(#[source] std::io::Error),
    /// Failed to parse the contents of the mock data file as JSON
    #[error("failed to parse mock data as JSON")]
    ParseJson(#[source] serde_json::Error),
}

/// Reads a map of URL to mock response from disk.
fn read_mock_responses(
    path: impl AsRef<Path>,
) -> Result<HashMap<String, MockResponse>, MockDataError> {
    let contents = std::fs::read_to_string(path).map_err(MockDataError::ReadMockFile)?;
    serde_json::from_str(&contents).map_err(MockDataError::ParseJson)
}

/// A transport that can be seeded with mock responses
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    responses: MockField<HashMap<String, MockResponse>>,
    hits: MockField<HashMap<String, usize>>,
}

impl MockTransport {
    /// Create a new mock transport, potentially reading mock responses from disk
    pub fn new(mock_data_path: Option<impl AsRef<Path>>) -> Result<Self, MockDataError> {
        let responses = match mock_data_path {
            Some(path) => read_mock_responses(path)?,
            None => HashMap::new(),
        };
        debug!(n_responses = responses.len(), "created mock transport");
        Ok(Self {
            responses: Arc::new(Mutex::new(responses)),
            hits: Default::default(),
        })
    }

    /// Answer `url` with `body`
    pub fn push_json(&self, url: impl Into<String>, body: Value) {
        self.push_response(url, MockResponse::Json { body, delay_ms: 0 });
    }

    /// Answer `url` with `body` after `delay`
    pub fn push_json_delayed(&self, url: impl Into<String>, body: Value, delay: Duration) {
        self.push_response(url, MockResponse::Json {
            body,
            delay_ms: delay.as_millis() as u64,
        });
    }

    /// Fail every request to `url`
    pub fn push_failure(&self, url: impl Into<String>, error: impl Into<String>) {
        self.push_response(url, MockResponse::Failure {
            error: error.into(),
            delay_ms: 0,
        });
    }

    pub fn push_response(&self, url: impl Into<String>, response: MockResponse) {
        self.responses
            .lock()
            .expect("couldn't acquire mock lock")
            .insert(url.into(), response);
    }

    /// Number of requests made to `url` so far
    pub fn hits(&self, url: &str) -> usize {
        self.hits
            .lock()
            .expect("couldn't acquire mock lock")
            .get(url)
            .copied()
            .unwrap_or_default()
    }

    /// Number of requests made to any url so far
    pub fn total_hits(&self) -> usize {
        self.hits
            .lock()
            .expect("couldn't acquire mock lock")
            .values()
            .sum()
    }
}

impl JsonTransport for MockTransport {
    async fn fetch_json(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Value, TransportError> {
        let response = {
            *self
                .hits
                .lock()
                .expect("couldn't acquire mock lock")
                .entry(url.to_string())
                .or_default() += 1;
            self.responses
                .lock()
                .expect("couldn't acquire mock lock")
                .get(url)
                .cloned()
        };

        let Some(response) = response else {
            return Err(TransportError::Mocked {
                url: url.to_string(),
                message: "no mock response".to_string(),
            });
        };

        let delay = response.delay();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(TransportError::Cancelled { url: url.to_string() }),
            _ = tokio::time::sleep(delay) => {},
        }

        match response {
            MockResponse::Json { body, .. } => Ok(body),
            MockResponse::Failure { error, .. } => Err(TransportError::Mocked {
                url: url.to_string(),
                message: error,
            }),
        }
    }
}

#[cfg(any(test, feature = "tests"))]
pub mod test_helpers {
    use serde_json::json;
    use url::Url;

    use super::MockTransport;
    use crate::types::{Item, ListQuery};

    /// Detail url the seeded catalog uses for `name`.
    pub fn detail_url(list_url: &Url, name: &str) -> String {
        format!("{}/{name}/", list_url.as_str().trim_end_matches('/'))
    }

    /// List url for one window of the seeded catalog.
    pub fn page_url(list_url: &Url, limit: u32, offset: u64) -> String {
        let mut url = list_url.clone();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(ListQuery { limit, offset }.pairs());
        url.to_string()
    }

    /// Detail payload of `item` in the remote wire format.
    pub fn item_payload(item: &Item) -> serde_json::Value {
        json!({
            "name": item.name.as_str(),
            "sprites": { "front_default": item.image },
            "types": item
                .categories
                .iter()
                .enumerate()
                .map(|(slot, name)| json!({ "slot": slot + 1, "type": { "name": name } }))
                .collect::<Vec<_>>(),
        })
    }

    /// Serve `items` as a catalog paged by `page_size`.
    ///
    /// Registers every list window up to and including the first empty one,
    /// and a detail response for every item.
    pub fn seed_catalog(transport: &MockTransport, list_url: &Url, items: &[Item], page_size: u32) {
        let count = items.len() as u64;
        let mut offset = 0_u64;
        loop {
            let window = items
                .iter()
                .skip(offset as usize)
                .take(page_size as usize)
                .map(|item| json!({ "name": item.name.as_str(), "url": detail_url(list_url, &item.name) }))
                .collect::<Vec<_>>();
            let empty = window.is_empty();
            transport.push_json(
                page_url(list_url, page_size, offset),
                json!({ "count": count, "results": window }),
            );
            if empty {
                break;
            }
            offset += u64::from(page_size);
        }

        for item in items {
            transport.push_json(detail_url(list_url, &item.name), item_payload(item));
        }
    }
}

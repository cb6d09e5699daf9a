//! Error handling for catalog fetch operations.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single JSON request made through a [crate::JsonTransport].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid url '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("request to '{url}' failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("'{url}' responded with {status}")]
    Status { url: String, status: StatusCode },
    #[error("could not decode response from '{url}'")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to '{url}' was cancelled")]
    Cancelled { url: String },
    /// A canned failure served by [crate::MockTransport].
    #[error("mocked failure for '{url}': {message}")]
    Mocked { url: String, message: String },
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled { .. })
    }
}

/// Why a page (or bulk) fetch failed.
///
/// A page is all-or-nothing: either every reference on it resolved,
/// or the fetch fails with one of these and no items are returned.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The reference list request failed or its body was not a reference list.
    #[error("reference list '{url}' is unavailable")]
    ListUnavailable {
        url: String,
        #[source]
        source: ListError,
    },
    /// At least one reference on the page could not be dereferenced.
    #[error("item '{url}' is unavailable")]
    ItemUnavailable {
        url: String,
        #[source]
        source: ItemError,
    },
    /// The caller's cancellation token fired before the fetch completed.
    #[error("fetch was cancelled")]
    Cancelled,
}

/// Coarse classification of a [FetchError].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    ListUnavailable,
    ItemUnavailable,
    Cancelled,
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::ListUnavailable { .. } => FetchErrorKind::ListUnavailable,
            FetchError::ItemUnavailable { .. } => FetchErrorKind::ItemUnavailable,
            FetchError::Cancelled => FetchErrorKind::Cancelled,
        }
    }

    pub(crate) fn list(url: impl Into<String>, source: impl Into<ListError>) -> Self {
        let source = source.into();
        if source.is_cancelled() {
            return FetchError::Cancelled;
        }
        FetchError::ListUnavailable {
            url: url.into(),
            source,
        }
    }

    pub(crate) fn item(url: impl Into<String>, source: impl Into<ItemError>) -> Self {
        let source = source.into();
        if source.is_cancelled() {
            return FetchError::Cancelled;
        }
        FetchError::ItemUnavailable {
            url: url.into(),
            source,
        }
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("body is not a reference list")]
    Malformed(#[source] serde_json::Error),
}

impl ListError {
    fn is_cancelled(&self) -> bool {
        matches!(self, ListError::Transport(err) if err.is_cancelled())
    }
}

#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("body is not an item")]
    Malformed(#[source] serde_json::Error),
}

impl ItemError {
    fn is_cancelled(&self) -> bool {
        matches!(self, ItemError::Transport(err) if err.is_cancelled())
    }
}

/// Errors building a catalog client from configuration.
#[derive(Debug, Error)]
pub enum CatalogClientError {
    #[error("invalid catalog url '{url}'")]
    InvalidCatalogUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid header '{name}'")]
    InvalidHeader { name: String },
    #[error("could not build http client")]
    Build(#[source] reqwest::Error),
}

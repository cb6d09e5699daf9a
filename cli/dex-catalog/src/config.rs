//! Configuration types for catalog client construction.

use std::collections::BTreeMap;
use std::num::NonZeroU32;
use std::time::Duration;

/// List endpoint path used when none is configured.
pub const DEFAULT_LIST_PATH: &str = "catalog";

/// Number of items requested per incremental page.
pub const DEFAULT_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(20).unwrap();

/// Number of remaining unseen rows at which a scroll signal asks for more.
pub const DEFAULT_LOOKAHEAD: usize = 4;

/// Configuration for the HTTP transport and fetcher.
#[derive(Debug, Clone)]
pub struct CatalogClientConfig {
    /// Base URL for the catalog API.
    // Kept as a string, a parsed `Url` would normalize away the trailing slash.
    pub catalog_url: String,
    /// Path of the reference list endpoint, relative to `catalog_url`.
    pub list_path: String,
    /// Additional headers to include in requests.
    pub extra_headers: BTreeMap<String, String>,
    /// Optional `User-Agent` override.
    pub user_agent: Option<String>,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Timeout for a whole request, including reading the body.
    pub timeout: Duration,
}

impl CatalogClientConfig {
    pub fn new(catalog_url: impl Into<String>) -> Self {
        Self {
            catalog_url: catalog_url.into(),
            list_path: DEFAULT_LIST_PATH.to_string(),
            extra_headers: BTreeMap::new(),
            user_agent: None,
            connect_timeout: Duration::from_secs(15),
            timeout: Duration::from_secs(40),
        }
    }
}

/// Tunables of the load/search coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Items requested per page; the cursor advances by exactly this much.
    pub page_size: NonZeroU32,
    /// Scroll signals fire once at most this many displayed rows remain unseen.
    pub lookahead: usize,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

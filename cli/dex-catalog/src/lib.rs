//! Paginated two-tier catalog engine.
//!
//! This crate provides:
//! - A [JsonTransport] abstraction with HTTP and mock implementations
//! - [CatalogPageFetcher]: list a window of references, then resolve every
//!   reference concurrently into a full [Item]
//! - [CatalogLoadCoordinator]: the load/search state machine that grows a
//!   deduplicated collection from scroll signals and filters it on search
//!
//! ## Usage
//!
//! ```ignore
//! use dex_catalog::{
//!     CatalogClientConfig, CatalogLoadCoordinator, CatalogPageFetcher, CoordinatorConfig,
//!     HttpTransport,
//! };
//!
//! let config = CatalogClientConfig::new("https://pokeapi.co/api/v2/");
//! let transport = HttpTransport::new(config.clone())?;
//! let fetcher = CatalogPageFetcher::from_config(transport, &config)?;
//!
//! let mut coordinator =
//!     CatalogLoadCoordinator::new(fetcher, |item| println!("{item:?}"), CoordinatorConfig::default());
//! coordinator.on_become_visible();
//! coordinator.settle().await;
//! ```

mod config;
mod coordinator;
mod error;
mod fetcher;
mod mock;
mod transport;
mod types;

pub use config::{
    CatalogClientConfig,
    CoordinatorConfig,
    DEFAULT_LIST_PATH,
    DEFAULT_LOOKAHEAD,
    DEFAULT_PAGE_SIZE,
};
pub use coordinator::{
    CatalogLoadCoordinator,
    DetailView,
    LOAD_FAILED_MESSAGE,
    LoadFailed,
    LoadOutcome,
};
pub use error::{
    CatalogClientError,
    FetchError,
    FetchErrorKind,
    ItemError,
    ListError,
    TransportError,
};
pub use fetcher::{BULK_PAGE_SIZE, CatalogPageFetcher, PageSource};
#[cfg(any(test, feature = "tests"))]
pub use mock::test_helpers;
pub use mock::{DEX_CATALOG_MOCK_DATA_VAR, MockDataError, MockResponse, MockTransport};
pub use transport::{HttpTransport, JsonTransport, Transport};
pub use types::{Item, ItemName, ItemReference, ListQuery, Page, ReferencePage};
// Re-exported so consumers can drive cancellation without depending on tokio-util.
pub use tokio_util::sync::CancellationToken;

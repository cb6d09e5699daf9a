//! Two-stage fetch of catalog pages: a window of references, then every
//! reference dereferenced concurrently into a full [Item].

use std::fmt::Debug;
use std::future::Future;
use std::num::NonZeroU32;

use async_stream::try_stream;
use futures::TryStreamExt;
use futures::future::try_join_all;
use futures::stream::Stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogClientConfig;
use crate::error::{CatalogClientError, FetchError, ItemError, ListError};
use crate::transport::JsonTransport;
use crate::types::{Item, ItemPayload, ItemReference, ListQuery, Page, ReferencePage};

/// Window size used when walking the whole catalog with [CatalogPageFetcher::fetch_all].
pub const BULK_PAGE_SIZE: NonZeroU32 = NonZeroU32::new(10).unwrap();

/// Anything that can produce resolved pages.
///
/// This trait enables alternate implementations:
/// - **Remote** (current): [CatalogPageFetcher] over a [JsonTransport]
/// - **Scripted** (tests): canned pages without any transport
pub trait PageSource {
    /// Fetch the window `[offset, offset + limit)` with every item resolved.
    fn fetch_page(
        &self,
        offset: u64,
        limit: NonZeroU32,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Page, FetchError>> + Send;
}

/// Resolves catalog pages through a [JsonTransport].
pub struct CatalogPageFetcher<T> {
    transport: T,
    list_url: Url,
    bulk_page_size: NonZeroU32,
}

impl<T> Debug for CatalogPageFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogPageFetcher")
            .field("list_url", &self.list_url.as_str())
            .field("bulk_page_size", &self.bulk_page_size)
            .finish_non_exhaustive()
    }
}

impl<T: JsonTransport + Sync> CatalogPageFetcher<T> {
    /// Create a fetcher reading references from `list_url`.
    pub fn new(transport: T, list_url: Url) -> Self {
        Self {
            transport,
            list_url,
            bulk_page_size: BULK_PAGE_SIZE,
        }
    }

    /// Create a fetcher for `<catalog_url>/<list_path>`.
    pub fn from_config(
        transport: T,
        config: &CatalogClientConfig,
    ) -> Result<Self, CatalogClientError> {
        let list_url = list_url(&config.catalog_url, &config.list_path)?;
        debug!(%list_url, "configured reference list endpoint");
        Ok(Self::new(transport, list_url))
    }

    /// Use `size` references per list request in [Self::fetch_all].
    pub fn with_bulk_page_size(mut self, size: NonZeroU32) -> Self {
        self.bulk_page_size = size;
        self
    }

    pub fn list_url(&self) -> &Url {
        &self.list_url
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch one window of references and resolve all of them.
    ///
    /// Items are returned in reference order. If any single reference
    /// fails to resolve, the whole page fails and no items are returned.
    #[instrument(skip(self, cancel), fields(progress = "Fetching catalog page"))]
    pub async fn fetch_page(
        &self,
        offset: u64,
        limit: NonZeroU32,
        cancel: &CancellationToken,
    ) -> Result<Page, FetchError> {
        // Stops the remaining dereferences once this page is decided either way.
        let page_cancel = cancel.child_token();
        let _page_guard = page_cancel.clone().drop_guard();

        let references = self
            .fetch_references(
                ListQuery {
                    limit: limit.get(),
                    offset,
                },
                &page_cancel,
            )
            .await?;

        let items = self.resolve_all(&references.results, &page_cancel).await?;
        debug!(n_items = items.len(), total_count = references.count, "resolved page");

        Ok(Page {
            items,
            total_count: references.count,
        })
    }

    /// Walk the entire reference list, then resolve every reference at once.
    #[instrument(skip_all, fields(progress = "Fetching entire catalog"))]
    pub async fn fetch_all(&self, cancel: &CancellationToken) -> Result<Vec<Item>, FetchError> {
        let cancel = cancel.child_token();
        let _guard = cancel.clone().drop_guard();
        let cancel = &cancel;

        let references = make_depaging_stream(
            |offset, limit| async move {
                let page = self
                    .fetch_references(ListQuery { limit, offset }, cancel)
                    .await?;
                Ok::<_, FetchError>((page.count, page.results))
            },
            self.bulk_page_size,
        )
        .try_collect::<Vec<_>>()
        .await?;

        debug!(n_references = references.len(), "resolving all references");
        self.resolve_all(&references, cancel).await
    }

    async fn fetch_references(
        &self,
        query: ListQuery,
        cancel: &CancellationToken,
    ) -> Result<ReferencePage, FetchError> {
        let mut url = self.list_url.clone();
        url.query_pairs_mut().clear().extend_pairs(query.pairs());

        debug!(%url, "requesting reference list");
        let body = self
            .transport
            .fetch_json(url.as_str(), cancel)
            .await
            .map_err(|err| FetchError::list(url.as_str(), err))?;

        serde_json::from_value(body)
            .map_err(|err| FetchError::list(url.as_str(), ListError::Malformed(err)))
    }

    async fn resolve_all(
        &self,
        references: &[ItemReference],
        cancel: &CancellationToken,
    ) -> Result<Vec<Item>, FetchError> {
        // `try_join_all` keeps input order and drops the siblings on the first error.
        try_join_all(
            references
                .iter()
                .map(|reference| self.resolve(reference, cancel)),
        )
        .await
    }

    async fn resolve(
        &self,
        reference: &ItemReference,
        cancel: &CancellationToken,
    ) -> Result<Item, FetchError> {
        let body = self
            .transport
            .fetch_json(&reference.url, cancel)
            .await
            .map_err(|err| FetchError::item(&reference.url, err))?;

        let payload: ItemPayload = serde_json::from_value(body)
            .map_err(|err| FetchError::item(&reference.url, ItemError::Malformed(err)))?;

        Ok(payload.into())
    }
}

impl<T: JsonTransport + Sync> PageSource for CatalogPageFetcher<T> {
    fn fetch_page(
        &self,
        offset: u64,
        limit: NonZeroU32,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Page, FetchError>> + Send {
        Self::fetch_page(self, offset, limit, cancel)
    }
}

/// Resolve `<catalog_url>/<list_path>`, regardless of a trailing slash on the base.
fn list_url(catalog_url: &str, list_path: &str) -> Result<Url, CatalogClientError> {
    let invalid = |source| CatalogClientError::InvalidCatalogUrl {
        url: catalog_url.to_string(),
        source,
    };
    let mut base = Url::parse(catalog_url).map_err(invalid)?;
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    base.join(list_path.trim_start_matches('/')).map_err(invalid)
}

/// Create a depaging stream from a window-fetching function.
///
/// Takes a function that returns `(total_count, items)` for a given
/// `(offset, limit)` and yields all items across windows, until the total
/// count is reached or a window comes back short.
fn make_depaging_stream<T, E, Fut>(
    generator: impl Fn(u64, u32) -> Fut,
    page_size: NonZeroU32,
) -> impl Stream<Item = Result<T, E>>
where
    Fut: Future<Output = Result<(u64, Vec<T>), E>>,
{
    try_stream! {
        let mut offset = 0_u64;

        loop {
            let (total_count, results) = generator(offset, page_size.get()).await?;

            let items_on_page = results.len();

            for result in results {
                yield result;
            }

            offset += u64::from(page_size.get());

            if items_on_page < page_size.get() as usize {
                break;
            }
            if offset >= total_count {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use httpmock::MockServer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::error::{FetchErrorKind, TransportError};
    use crate::mock::MockTransport;
    use crate::mock::test_helpers::{detail_url, item_payload, page_url, seed_catalog};

    const LIST_URL: &str = "https://dex.test/api/catalog";

    fn list() -> Url {
        Url::parse(LIST_URL).unwrap()
    }

    fn items(names: &[&str]) -> Vec<Item> {
        names
            .iter()
            .map(|name| Item::new(*name, Some(format!("https://img/{name}.png")), ["normal"]))
            .collect()
    }

    fn fetcher(transport: MockTransport) -> CatalogPageFetcher<MockTransport> {
        CatalogPageFetcher::new(transport, list())
    }

    fn limit(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[test]
    fn list_url_handles_trailing_slash() {
        assert_eq!(
            list_url("https://pokeapi.co/api/v2/", "pokemon").unwrap().as_str(),
            "https://pokeapi.co/api/v2/pokemon"
        );
        assert_eq!(
            list_url("https://pokeapi.co/api/v2", "/pokemon").unwrap().as_str(),
            "https://pokeapi.co/api/v2/pokemon"
        );
        assert!(matches!(
            list_url("not a url", "catalog"),
            Err(CatalogClientError::InvalidCatalogUrl { .. })
        ));
    }

    #[tokio::test]
    async fn fetch_page_resolves_every_reference() {
        let transport = MockTransport::default();
        let catalog = items(&["bulbasaur", "ivysaur", "venusaur", "charmander"]);
        seed_catalog(&transport, &list(), &catalog, 2);

        let page = fetcher(transport.clone())
            .fetch_page(2, limit(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.items, catalog[2..4].to_vec());
        assert_eq!(page.total_count, 4);
        assert_eq!(transport.hits(&page_url(&list(), 2, 2)), 1);
        assert_eq!(transport.hits(&detail_url(&list(), "bulbasaur")), 0);
    }

    /// Completion order C, A, B still yields [A, B, C].
    #[tokio::test(start_paused = true)]
    async fn page_order_follows_references_not_completion() {
        let transport = MockTransport::default();
        let catalog = items(&["a", "b", "c"]);
        seed_catalog(&transport, &list(), &catalog, 3);
        let delays = [("a", 20), ("b", 30), ("c", 10)];
        for (item, (name, delay)) in catalog.iter().zip(delays) {
            transport.push_json_delayed(
                detail_url(&list(), name),
                item_payload(item),
                Duration::from_millis(delay),
            );
        }

        let page = fetcher(transport)
            .fetch_page(0, limit(3), &CancellationToken::new())
            .await
            .unwrap();

        let names = page
            .items
            .iter()
            .map(|item| item.name.as_str())
            .collect::<Vec<_>>();
        assert_eq!(names, ["a", "b", "c"]);
    }

    #[tokio::test]
    async fn failed_list_request_is_list_unavailable() {
        let transport = MockTransport::default();
        transport.push_failure(page_url(&list(), 5, 0), "503");

        let result = fetcher(transport)
            .fetch_page(0, limit(5), &CancellationToken::new())
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::ListUnavailable);
    }

    #[tokio::test]
    async fn malformed_list_is_list_unavailable() {
        let transport = MockTransport::default();
        transport.push_json(page_url(&list(), 5, 0), json!({ "items": [] }));

        let err = fetcher(transport)
            .fetch_page(0, limit(5), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(&err, FetchError::ListUnavailable {
                source: ListError::Malformed(_),
                ..
            }),
            "found: {err:?}"
        );
    }

    /// One failing dereference fails the whole page.
    #[tokio::test]
    async fn one_failed_item_fails_the_page() {
        let transport = MockTransport::default();
        let catalog = items(&["bulbasaur", "ivysaur", "venusaur"]);
        seed_catalog(&transport, &list(), &catalog, 3);
        transport.push_failure(detail_url(&list(), "venusaur"), "500");

        let err = fetcher(transport)
            .fetch_page(0, limit(3), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(&err, FetchError::ItemUnavailable { url, .. } if url == &detail_url(&list(), "venusaur")),
            "found: {err:?}"
        );
    }

    #[tokio::test]
    async fn malformed_item_is_item_unavailable() {
        let transport = MockTransport::default();
        let catalog = items(&["bulbasaur"]);
        seed_catalog(&transport, &list(), &catalog, 1);
        transport.push_json(detail_url(&list(), "bulbasaur"), json!({ "title": "?" }));

        let err = fetcher(transport)
            .fetch_page(0, limit(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::ItemUnavailable);
    }

    /// The failing item does not wait for its slow siblings.
    #[tokio::test(start_paused = true)]
    async fn failure_cancels_sibling_dereferences() {
        let transport = MockTransport::default();
        let catalog = items(&["fast", "slow"]);
        seed_catalog(&transport, &list(), &catalog, 2);
        transport.push_failure(detail_url(&list(), "fast"), "boom");
        transport.push_json_delayed(
            detail_url(&list(), "slow"),
            item_payload(&catalog[1]),
            Duration::from_secs(3600),
        );

        let started = tokio::time::Instant::now();
        let err = fetcher(transport)
            .fetch_page(0, limit(2), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), FetchErrorKind::ItemUnavailable);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_fetch_reports_cancelled() {
        let transport = MockTransport::default();
        let catalog = items(&["bulbasaur"]);
        seed_catalog(&transport, &list(), &catalog, 1);
        transport.push_json_delayed(
            detail_url(&list(), "bulbasaur"),
            item_payload(&catalog[0]),
            Duration::from_secs(60),
        );

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });

        let err = fetcher(transport)
            .fetch_page(0, limit(1), &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn fetch_all_walks_every_window() {
        let transport = MockTransport::default();
        let names = (1..=23).map(|n| format!("item-{n:02}")).collect::<Vec<_>>();
        let catalog = names
            .iter()
            .map(|name| Item::new(name.as_str(), None, ["bug"]))
            .collect::<Vec<_>>();
        seed_catalog(&transport, &list(), &catalog, 10);

        let all = fetcher(transport.clone())
            .fetch_all(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(all, catalog);
        assert_eq!(transport.hits(&page_url(&list(), 10, 0)), 1);
        assert_eq!(transport.hits(&page_url(&list(), 10, 10)), 1);
        assert_eq!(transport.hits(&page_url(&list(), 10, 20)), 1);
        // The short third window ends the walk.
        assert_eq!(transport.hits(&page_url(&list(), 10, 30)), 0);
    }

    #[tokio::test]
    async fn fetch_all_respects_bulk_page_size() {
        let transport = MockTransport::default();
        let catalog = items(&["a", "b", "c", "d"]);
        seed_catalog(&transport, &list(), &catalog, 2);

        let all = fetcher(transport.clone())
            .with_bulk_page_size(limit(2))
            .fetch_all(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(all, catalog);
        // The total count is reached after the second full window.
        assert_eq!(transport.hits(&page_url(&list(), 2, 4)), 0);
    }

    #[tokio::test]
    async fn fetch_all_fails_when_any_item_fails() {
        let transport = MockTransport::default();
        let catalog = items(&["a", "b", "c"]);
        seed_catalog(&transport, &list(), &catalog, 10);
        transport.push_failure(detail_url(&list(), "b"), "gone");

        let err = fetcher(transport)
            .fetch_all(&CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::ItemUnavailable);
    }

    #[tokio::test]
    async fn fetch_page_over_http() {
        let server = MockServer::start_async().await;
        let list_mock = server.mock(|when, then| {
            when.path("/api/v2/pokemon")
                .query_param("limit", "2")
                .query_param("offset", "0");
            then.status(200).json_body(json!({
                "count": 1302,
                "results": [
                    { "name": "bulbasaur", "url": server.url("/api/v2/pokemon/1/") },
                    { "name": "ivysaur", "url": server.url("/api/v2/pokemon/2/") },
                ]
            }));
        });
        let bulbasaur = server.mock(|when, then| {
            when.path("/api/v2/pokemon/1/");
            then.status(200).json_body(json!({
                "name": "bulbasaur",
                "sprites": { "front_default": "https://img/1.png" },
                "types": [{ "type": { "name": "grass" } }, { "type": { "name": "poison" } }]
            }));
        });
        let ivysaur = server.mock(|when, then| {
            when.path("/api/v2/pokemon/2/");
            then.status(200).json_body(json!({
                "name": "ivysaur",
                "sprites": { "front_default": null },
                "types": [{ "type": { "name": "grass" } }]
            }));
        });

        let config = CatalogClientConfig {
            list_path: "pokemon".to_string(),
            ..CatalogClientConfig::new(server.url("/api/v2/"))
        };
        let transport = crate::HttpTransport::new(config.clone()).unwrap();
        let fetcher = CatalogPageFetcher::from_config(transport, &config).unwrap();

        let page = fetcher
            .fetch_page(0, limit(2), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(page.total_count, 1302);
        assert_eq!(page.items, vec![
            Item::new("bulbasaur", Some("https://img/1.png".to_string()), [
                "grass", "poison"
            ]),
            Item::new("ivysaur", None, ["grass"]),
        ]);
        list_mock.assert();
        bulbasaur.assert();
        ivysaur.assert();
    }

    #[tokio::test]
    async fn http_item_failure_fails_page() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.path("/catalog");
            then.status(200).json_body(json!({
                "count": 1,
                "results": [{ "name": "bulbasaur", "url": server.url("/catalog/1/") }]
            }));
        });
        server.mock(|when, then| {
            when.path("/catalog/1/");
            then.status(500);
        });

        let config = CatalogClientConfig::new(server.base_url());
        let transport = crate::HttpTransport::new(config.clone()).unwrap();
        let fetcher = CatalogPageFetcher::from_config(transport, &config).unwrap();

        let err = fetcher
            .fetch_page(0, limit(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(
            matches!(&err, FetchError::ItemUnavailable {
                source: ItemError::Transport(TransportError::Status { .. }),
                ..
            }),
            "found: {err:?}"
        );
    }

    /// make_depaging_stream collects items from multiple windows
    #[tokio::test]
    async fn depage_multiple_pages() {
        let results = vec![vec![1, 2, 3], vec![4, 5, 6], vec![7, 8, 9]];
        let total_results = 9_u64;
        let results = &results;
        let stream = make_depaging_stream(
            |offset, limit| async move {
                let page = (offset / u64::from(limit)) as usize;
                Ok::<_, String>((total_results, results.get(page).cloned().unwrap_or_default()))
            },
            NonZeroU32::new(3).unwrap(),
        );

        let collected = stream.try_collect::<Vec<_>>().await.unwrap();
        assert_eq!(collected, (1..=9).collect::<Vec<_>>());
    }

    /// make_depaging_stream stops when the total count is reached
    #[tokio::test]
    async fn depage_stops_at_total_count() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let calls = &calls;
        let stream = make_depaging_stream(
            |offset, _limit| async move {
                calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                let start = offset as i32;
                Ok::<_, String>((3, vec![start + 1, start + 2, start + 3]))
            },
            NonZeroU32::new(3).unwrap(),
        );

        let collected: Vec<i32> = stream.try_collect().await.unwrap();
        assert_eq!(collected, [1, 2, 3]);
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    /// make_depaging_stream stops on an empty window even if the count says otherwise
    #[tokio::test]
    async fn depage_stops_on_empty_page() {
        let stream = make_depaging_stream(
            |_offset, _limit| async move { Ok::<(u64, Vec<i32>), String>((100, vec![])) },
            NonZeroU32::new(3).unwrap(),
        );

        let collected: Vec<i32> = stream.try_collect().await.unwrap();
        assert!(collected.is_empty());
    }

    /// make_depaging_stream surfaces the first window error
    #[tokio::test]
    async fn depage_propagates_errors() {
        let stream = make_depaging_stream(
            |_offset, _limit| async move { Err::<(u64, Vec<i32>), _>("nope".to_string()) },
            NonZeroU32::new(3).unwrap(),
        );

        let collected = stream.collect::<Vec<_>>().await;
        assert_eq!(collected, vec![Err("nope".to_string())]);
    }
}

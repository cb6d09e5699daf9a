//! Load/search state machine driving a [PageSource] from UI signals.
//!
//! The coordinator owns the canonical collection and the displayed view.
//! Page fetches run as spawned tasks that only return data; their results
//! are merged by [CatalogLoadCoordinator::next_completion], which the
//! consumer awaits on its own task, so all state is mutated from one place.

use std::sync::Arc;

use derive_more::Display;
use indexmap::IndexMap;
use indexmap::map::Entry;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::config::CoordinatorConfig;
use crate::error::FetchError;
use crate::fetcher::PageSource;
use crate::types::{Item, ItemName, Page};

/// Text of the notification shown for any failed page load.
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load catalog data.";

/// Receives items the user selected from the displayed view.
pub trait DetailView {
    fn show(&self, item: Arc<Item>);
}

impl<F> DetailView for F
where
    F: Fn(Arc<Item>),
{
    fn show(&self, item: Arc<Item>) {
        self(item)
    }
}

/// A page load failed; the window at `offset` can be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("{}", LOAD_FAILED_MESSAGE)]
pub struct LoadFailed {
    pub offset: u64,
}

/// What applying a finished page fetch did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Merged {
        /// Items added to the canonical collection.
        accepted: usize,
        /// Items dropped because their name was already loaded.
        skipped: usize,
        /// Whether the accepted items were appended to the displayed view.
        displayed: bool,
    },
    Failed,
    Cancelled,
}

struct InFlight {
    offset: u64,
    handle: JoinHandle<Result<Page, FetchError>>,
}

pub struct CatalogLoadCoordinator<S, V> {
    source: Arc<S>,
    detail_view: V,
    config: CoordinatorConfig,

    canonical: IndexMap<ItemName, Arc<Item>>,
    displayed: watch::Sender<Vec<Arc<Item>>>,
    alerts: mpsc::UnboundedSender<LoadFailed>,
    alerts_rx: Option<mpsc::UnboundedReceiver<LoadFailed>>,

    cursor: u64,
    loading: bool,
    searching: bool,
    in_flight: Option<InFlight>,
    cancel: CancellationToken,
}

impl<S, V> CatalogLoadCoordinator<S, V>
where
    S: PageSource + Send + Sync + 'static,
    V: DetailView,
{
    pub fn new(source: S, detail_view: V, config: CoordinatorConfig) -> Self {
        let (displayed, _) = watch::channel(Vec::new());
        let (alerts, alerts_rx) = mpsc::unbounded_channel();
        Self {
            source: Arc::new(source),
            detail_view,
            config,
            canonical: IndexMap::new(),
            displayed,
            alerts,
            alerts_rx: Some(alerts_rx),
            cursor: 0,
            loading: false,
            searching: false,
            in_flight: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Observe the displayed view.
    pub fn displayed(&self) -> watch::Receiver<Vec<Arc<Item>>> {
        self.displayed.subscribe()
    }

    /// Take the receiving end of load failure notifications.
    ///
    /// Returns `None` once it has been taken.
    pub fn alerts(&mut self) -> Option<mpsc::UnboundedReceiver<LoadFailed>> {
        self.alerts_rx.take()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// Offset of the next page to request.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// Every item loaded so far, in arrival order.
    pub fn canonical(&self) -> impl ExactSizeIterator<Item = &Arc<Item>> {
        self.canonical.values()
    }

    /// Snapshot of the displayed view.
    pub fn displayed_items(&self) -> Vec<Arc<Item>> {
        self.displayed.borrow().clone()
    }

    /// The view was shown; loads the first page if nothing is loaded yet.
    pub fn on_become_visible(&mut self) -> bool {
        if !self.canonical.is_empty() {
            trace!("catalog already loaded");
            return false;
        }
        self.request_next_page()
    }

    /// The consumer is close to the end of the displayed view.
    ///
    /// Ignored while a search is active.
    pub fn on_scroll_near_end(&mut self) -> bool {
        if self.searching {
            trace!("ignoring scroll signal while searching");
            return false;
        }
        self.request_next_page()
    }

    /// Raise [Self::on_scroll_near_end] once no more than `lookahead`
    /// displayed rows follow `last_visible_index`.
    pub fn on_scrolled(&mut self, last_visible_index: usize) -> bool {
        let len = self.displayed.borrow().len();
        let remaining = len.saturating_sub(last_visible_index.saturating_add(1));
        if remaining > self.config.lookahead {
            return false;
        }
        self.on_scroll_near_end()
    }

    /// Start fetching the page at the cursor.
    ///
    /// Does nothing while a page is in flight or a search is active.
    /// Returns whether a fetch was started.
    pub fn request_next_page(&mut self) -> bool {
        if self.loading || self.searching {
            trace!(
                loading = self.loading,
                searching = self.searching,
                "dropping page request"
            );
            return false;
        }

        self.loading = true;
        let offset = self.cursor;
        let limit = self.config.page_size;
        let source = Arc::clone(&self.source);
        let cancel = self.cancel.child_token();

        debug!(offset, limit = limit.get(), "requesting next page");
        let handle =
            tokio::spawn(async move { source.fetch_page(offset, limit, &cancel).await });
        self.in_flight = Some(InFlight { offset, handle });
        true
    }

    /// Wait for the in-flight page, if any, and apply its result.
    ///
    /// Returns `None` immediately when nothing is in flight.
    /// Cancel safe: if the returned future is dropped, the page stays in
    /// flight and is applied by the next call.
    pub async fn next_completion(&mut self) -> Option<LoadOutcome> {
        let in_flight = self.in_flight.as_mut()?;
        let joined = (&mut in_flight.handle).await;
        let offset = in_flight.offset;
        self.in_flight = None;
        Some(self.apply(offset, joined))
    }

    /// Drive [Self::next_completion] until no page is in flight.
    pub async fn settle(&mut self) -> Option<LoadOutcome> {
        let mut last = None;
        while let Some(outcome) = self.next_completion().await {
            last = Some(outcome);
        }
        last
    }

    fn apply(
        &mut self,
        offset: u64,
        joined: Result<Result<Page, FetchError>, JoinError>,
    ) -> LoadOutcome {
        self.loading = false;

        match joined {
            Ok(Ok(page)) => self.merge(page),
            Ok(Err(FetchError::Cancelled)) => {
                debug!(offset, "page fetch cancelled");
                LoadOutcome::Cancelled
            },
            Err(err) if err.is_cancelled() => {
                debug!(offset, "page task aborted");
                LoadOutcome::Cancelled
            },
            Ok(Err(err)) => {
                warn!(offset, error = ?err, "failed to load page");
                self.notify_failure(offset);
                LoadOutcome::Failed
            },
            Err(err) => {
                warn!(offset, error = %err, "page task panicked");
                self.notify_failure(offset);
                LoadOutcome::Failed
            },
        }
    }

    #[instrument(skip_all, fields(n_items = page.items.len()))]
    fn merge(&mut self, page: Page) -> LoadOutcome {
        let mut accepted = Vec::with_capacity(page.items.len());
        let mut skipped = 0;

        for item in page.items {
            match self.canonical.entry(item.name.clone()) {
                Entry::Occupied(_) => {
                    trace!(name = %item.name, "skipping already loaded item");
                    skipped += 1;
                },
                Entry::Vacant(entry) => accepted.push(Arc::clone(entry.insert(Arc::new(item)))),
            }
        }

        self.cursor += u64::from(self.config.page_size.get());

        let displayed = !self.searching;
        if displayed && !accepted.is_empty() {
            self.displayed
                .send_modify(|view| view.extend(accepted.iter().cloned()));
        }

        debug!(
            accepted = accepted.len(),
            skipped,
            displayed,
            cursor = self.cursor,
            "merged page"
        );
        LoadOutcome::Merged {
            accepted: accepted.len(),
            skipped,
            displayed,
        }
    }

    fn notify_failure(&self, offset: u64) {
        if self.alerts.send(LoadFailed { offset }).is_err() {
            debug!("load failure notification dropped, nobody is listening");
        }
    }

    /// Replace the displayed view for a new search text.
    ///
    /// Blank text ends the search and shows everything loaded.
    /// Anything else shows the loaded items whose name starts with `text`,
    /// ignoring case.
    #[instrument(skip(self))]
    pub fn on_search_text_changed(&mut self, text: &str) {
        if text.trim().is_empty() {
            self.searching = false;
            self.displayed
                .send_replace(self.canonical.values().cloned().collect());
            debug!(n_items = self.canonical.len(), "search cleared");
            return;
        }

        self.searching = true;
        let prefix = text.to_lowercase();
        let view = self
            .canonical
            .values()
            .filter(|item| item.name.to_lowercase().starts_with(&prefix))
            .cloned()
            .collect::<Vec<_>>();
        debug!(n_matches = view.len(), "search applied");
        self.displayed.send_replace(view);
    }

    /// Hand `item` to the detail view.
    pub fn on_item_selected(&self, item: Arc<Item>) {
        debug!(name = %item.name, "showing item details");
        self.detail_view.show(item);
    }

    /// Select the displayed row at `index`, if it exists.
    pub fn select_displayed(&self, index: usize) -> Option<Arc<Item>> {
        let item = self.displayed.borrow().get(index).cloned()?;
        self.on_item_selected(Arc::clone(&item));
        Some(item)
    }

    /// Cancel the in-flight page, if any, and wait for it to stop.
    ///
    /// Pages requested afterwards resolve as cancelled.
    pub async fn shutdown(&mut self) {
        self.cancel.cancel();
        if let Some(outcome) = self.settle().await {
            debug!(?outcome, "coordinator shut down");
        }
    }
}

impl<S, V> Drop for CatalogLoadCoordinator<S, V> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

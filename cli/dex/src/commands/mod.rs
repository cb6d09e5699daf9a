mod all;
mod browse;
mod list;
mod search;

use std::num::NonZeroU32;

use anyhow::{Result, bail};
use bpaf::Bpaf;
use dex_catalog::{
    CatalogLoadCoordinator,
    DetailView,
    LOAD_FAILED_MESSAGE,
    LoadFailed,
    LoadOutcome,
    PageSource,
};
use indoc::indoc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::debug;

use crate::config::Config;
use crate::utils::message;

static DEX_DESCRIPTION: &'_ str = indoc! {"
    dex browses a paginated remote catalog.\n\n

    Items are loaded a page at a time and can be filtered by name prefix.
    By default the catalog is PokeAPI; see 'dex.toml' for other catalogs."
};

fn vec_len<T>(x: Vec<T>) -> usize {
    Vec::len(&x)
}

#[derive(Bpaf, Clone, Copy, Debug)]
pub enum Verbosity {
    Verbose(
        /// Increase logging verbosity
        ///
        /// Invoke multiple times for increasing detail.
        #[bpaf(short('v'), long("verbose"), req_flag(()), many, map(vec_len))]
        usize,
    ),

    /// Silence logs except for errors
    #[bpaf(short, long)]
    Quiet,
}

impl Default for Verbosity {
    fn default() -> Self {
        Verbosity::Verbose(0)
    }
}

#[derive(Bpaf)]
#[bpaf(options, descr(DEX_DESCRIPTION))]
pub struct DexCli(#[bpaf(external(dex_args))] pub DexArgs);

/// Main dex args parser
///
/// To parse the dex CLI, use [`DexCli`] instead using [`dex_cli()`].
#[derive(Debug, Bpaf)]
#[bpaf(ignore_rustdoc)] // we don't want this struct to be interpreted as a group
pub struct DexArgs {
    /// Verbose mode
    ///
    /// Invoke multiple times for increasing detail.
    #[bpaf(external, fallback(Default::default()))]
    pub verbosity: Verbosity,

    #[bpaf(external(commands))]
    command: Commands,
}

impl DexArgs {
    pub async fn handle(self, config: Config) -> Result<()> {
        match self.command {
            Commands::List(args) => args.handle(config).await,
            Commands::Search(args) => args.handle(config).await,
            Commands::All(args) => args.handle(config).await,
            Commands::Browse(args) => args.handle(config).await,
        }
    }
}

#[derive(Bpaf, Clone, Debug)]
enum Commands {
    /// Print the first pages of the catalog
    #[bpaf(command)]
    List(#[bpaf(external(list::list))] list::List),

    /// Print loaded items whose name starts with a prefix
    #[bpaf(command)]
    Search(#[bpaf(external(search::search))] search::Search),

    /// Print the entire catalog
    #[bpaf(command)]
    All(#[bpaf(external(all::all))] all::All),

    /// Interactively page through and search the catalog
    #[bpaf(command)]
    Browse(#[bpaf(external(browse::browse))] browse::Browse),
}

/// Show the catalog and scroll to its end until `pages` pages are loaded.
///
/// Stops early once a page adds nothing.
/// A failed page is an error if nothing was loaded before it,
/// and a warning otherwise.
pub(crate) async fn load_pages<S, V>(
    coordinator: &mut CatalogLoadCoordinator<S, V>,
    alerts: &mut UnboundedReceiver<LoadFailed>,
    pages: NonZeroU32,
) -> Result<()>
where
    S: PageSource + Send + Sync + 'static,
    V: DetailView,
{
    for page in 0..pages.get() {
        let requested = if page == 0 {
            coordinator.on_become_visible()
        } else {
            coordinator.on_scroll_near_end()
        };
        if !requested {
            break;
        }

        match coordinator.settle().await {
            Some(LoadOutcome::Merged { accepted: 0, .. }) => {
                debug!(page, "catalog exhausted");
                break;
            },
            Some(LoadOutcome::Failed) | Some(LoadOutcome::Cancelled) | None => break,
            Some(LoadOutcome::Merged { .. }) => {},
        }
    }

    if let Ok(alert) = alerts.try_recv() {
        if coordinator.canonical().len() == 0 {
            bail!(LOAD_FAILED_MESSAGE);
        }
        message::warning(format!(
            "{alert} Showing the {} items loaded so far.",
            coordinator.canonical().len()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dex_catalog::test_helpers::{detail_url, page_url, seed_catalog};
    use dex_catalog::{CatalogPageFetcher, CoordinatorConfig, Item, MockTransport};
    use pretty_assertions::assert_eq;
    use url::Url;

    use super::*;
    use crate::utils::message::history::History;

    type Coordinator = CatalogLoadCoordinator<CatalogPageFetcher<MockTransport>, fn(Arc<Item>)>;

    fn list_url() -> Url {
        Url::parse("https://dex.test/api/pokemon").unwrap()
    }

    fn catalog(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item::new(format!("item-{i:02}"), None, ["normal"]))
            .collect()
    }

    fn coordinator(transport: &MockTransport) -> (Coordinator, UnboundedReceiver<LoadFailed>) {
        let fetcher = CatalogPageFetcher::new(transport.clone(), list_url());
        let mut coordinator: Coordinator = CatalogLoadCoordinator::new(
            fetcher,
            (|_: Arc<Item>| {}) as fn(Arc<Item>),
            CoordinatorConfig {
                page_size: NonZeroU32::new(2).unwrap(),
                ..Default::default()
            },
        );
        let alerts = coordinator.alerts().unwrap();
        (coordinator, alerts)
    }

    fn pages(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    #[tokio::test]
    async fn loads_requested_number_of_pages() {
        let transport = MockTransport::default();
        seed_catalog(&transport, &list_url(), &catalog(7), 2);
        let (mut coordinator, mut alerts) = coordinator(&transport);

        load_pages(&mut coordinator, &mut alerts, pages(3))
            .await
            .unwrap();

        assert_eq!(coordinator.canonical().len(), 6);
        assert_eq!(coordinator.cursor(), 6);
        assert_eq!(transport.hits(&page_url(&list_url(), 2, 6)), 0);
    }

    #[tokio::test]
    async fn stops_when_catalog_is_exhausted() {
        let transport = MockTransport::default();
        seed_catalog(&transport, &list_url(), &catalog(3), 2);
        let (mut coordinator, mut alerts) = coordinator(&transport);

        load_pages(&mut coordinator, &mut alerts, pages(10))
            .await
            .unwrap();

        assert_eq!(coordinator.canonical().len(), 3);
        // pages at offsets 0, 2 and the empty one at 4
        assert_eq!(transport.hits(&page_url(&list_url(), 2, 4)), 1);
        assert_eq!(transport.hits(&page_url(&list_url(), 2, 6)), 0);
    }

    #[tokio::test]
    async fn failure_without_items_is_an_error() {
        let transport = MockTransport::default();
        let items = catalog(2);
        seed_catalog(&transport, &list_url(), &items, 2);
        transport.push_failure(detail_url(&list_url(), items[1].name.as_str()), "500");
        let (mut coordinator, mut alerts) = coordinator(&transport);

        let err = load_pages(&mut coordinator, &mut alerts, pages(2))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), LOAD_FAILED_MESSAGE);
    }

    #[tokio::test]
    async fn failure_after_items_is_a_warning() {
        let transport = MockTransport::default();
        let items = catalog(4);
        seed_catalog(&transport, &list_url(), &items, 2);
        transport.push_failure(detail_url(&list_url(), items[3].name.as_str()), "500");
        let (mut coordinator, mut alerts) = coordinator(&transport);

        load_pages(&mut coordinator, &mut alerts, pages(3))
            .await
            .unwrap();

        assert_eq!(coordinator.canonical().len(), 2);
        assert_eq!(coordinator.cursor(), 2);
        let messages = History::global().messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains(LOAD_FAILED_MESSAGE));
        assert!(messages[0].contains("2 items"));
    }
}

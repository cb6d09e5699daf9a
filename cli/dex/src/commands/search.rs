use std::num::NonZeroU32;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use dex_catalog::CatalogLoadCoordinator;
use tracing::{debug, instrument};

use super::load_pages;
use crate::config::Config;
use crate::utils::display::{TerminalDetailView, print_items};
use crate::utils::init::init_fetcher;
use crate::utils::message;

// Search the loaded part of the catalog by name prefix
#[derive(Debug, Bpaf, Clone)]
pub struct Search {
    /// Number of pages to load before searching
    #[bpaf(long, short, argument("N"), fallback(NonZeroU32::MIN))]
    pub pages: NonZeroU32,

    /// Display items as a JSON array
    #[bpaf(long)]
    pub json: bool,

    /// Case insensitive prefix of the item names to show
    #[bpaf(positional("prefix"))]
    pub prefix: String,
}

impl Search {
    #[instrument(name = "search", fields(prefix = %self.prefix, pages = self.pages.get()), skip_all)]
    pub async fn handle(self, config: Config) -> Result<()> {
        let fetcher = init_fetcher(&config)?;
        let mut coordinator = CatalogLoadCoordinator::new(
            fetcher,
            TerminalDetailView,
            config.dex.coordinator_config(),
        );
        let mut alerts = coordinator
            .alerts()
            .context("load failure notifications already taken")?;

        load_pages(&mut coordinator, &mut alerts, self.pages).await?;

        debug!("performing search for prefix: {}", self.prefix);
        coordinator.on_search_text_changed(&self.prefix);
        let matches = coordinator.displayed_items();

        if matches.is_empty() && !self.json {
            message::warning(format!(
                "No loaded item starts with '{}'. Only the {} items loaded so far are searched, try a larger '--pages'.",
                self.prefix,
                coordinator.canonical().len()
            ));
            return Ok(());
        }

        print_items(&matches, self.json)
    }
}

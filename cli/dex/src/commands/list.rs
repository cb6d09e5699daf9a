use std::num::NonZeroU32;

use anyhow::{Context, Result};
use bpaf::Bpaf;
use dex_catalog::CatalogLoadCoordinator;
use tracing::instrument;

use super::load_pages;
use crate::config::Config;
use crate::utils::display::{TerminalDetailView, print_items};
use crate::utils::init::init_fetcher;

// Print the first pages of the catalog
#[derive(Debug, Bpaf, Clone)]
pub struct List {
    /// Number of pages to load
    #[bpaf(long, short, argument("N"), fallback(NonZeroU32::MIN))]
    pub pages: NonZeroU32,

    /// Display items as a JSON array
    #[bpaf(long)]
    pub json: bool,
}

impl List {
    #[instrument(name = "list", fields(pages = self.pages.get(), json = self.json), skip_all)]
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
        print_items(&coordinator.displayed_items(), self.json)
    }
}

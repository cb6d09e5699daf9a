use std::sync::Arc;

use anyhow::{Context, Result, bail};
use bpaf::Bpaf;
use dex_catalog::CancellationToken;
use tracing::instrument;

use crate::config::Config;
use crate::utils::display::print_items;
use crate::utils::init::init_fetcher;

// Print the entire catalog
#[derive(Debug, Bpaf, Clone)]
pub struct All {
    /// Display items as a JSON array
    #[bpaf(long)]
    pub json: bool,
}

impl All {
    #[instrument(name = "all", fields(json = self.json), skip_all)]
    pub async fn handle(self, config: Config) -> Result<()> {
        let fetcher = init_fetcher(&config)?;
        let cancel = CancellationToken::new();

        let items = tokio::select! {
            items = fetcher.fetch_all(&cancel) => items.context("Failed to load catalog data")?,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                bail!("Interrupted");
            },
        };

        let items = items.into_iter().map(Arc::new).collect::<Vec<_>>();
        print_items(&items, self.json)
    }
}

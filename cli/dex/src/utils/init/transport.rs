use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use dex_catalog::{
    CatalogPageFetcher,
    DEX_CATALOG_MOCK_DATA_VAR,
    HttpTransport,
    MockTransport,
    Transport,
};
use tracing::debug;

use crate::config::Config;

/// Initialize the transport used to reach the catalog
///
/// - Initialize a mock transport if `$DEX_CATALOG_MOCK_DATA` points at a
///   file of mock responses
/// - Initialize an HTTP transport otherwise
pub fn init_transport(config: &Config) -> Result<Transport> {
    if let Ok(path_str) = std::env::var(DEX_CATALOG_MOCK_DATA_VAR) {
        let path = PathBuf::from(path_str);
        if !path.exists() {
            bail!("path to mock data file doesn't exist: {}", path.display());
        }

        debug!(mock_data_path = %path.display(), "using mock catalog transport");
        let transport =
            MockTransport::new(Some(&path)).context("Could not load mock catalog data")?;
        return Ok(transport.into());
    }

    let client_config = config.dex.catalog_client_config();
    debug!(catalog_url = %client_config.catalog_url, "using catalog http transport");
    let transport =
        HttpTransport::new(client_config).context("Could not create catalog client")?;
    Ok(transport.into())
}

/// Initialize a page fetcher for the configured list endpoint
pub fn init_fetcher(config: &Config) -> Result<CatalogPageFetcher<Transport>> {
    let transport = init_transport(config)?;
    CatalogPageFetcher::from_config(transport, &config.dex.catalog_client_config())
        .context("Invalid catalog configuration")
}

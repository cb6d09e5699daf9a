use std::env;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config as HierarchicalConfig, Environment};
use dex_catalog::{CatalogClientConfig, CoordinatorConfig};
use serde::{Deserialize, Serialize};
use tracing::debug;
use xdg::BaseDirectories;

/// Name of dex managed directories
const DEX_DIR_NAME: &str = "dex";
const DEX_CONFIG_DIR_VAR: &str = "DEX_CONFIG_DIR";
pub const DEX_CONFIG_FILE: &str = "dex.toml";

pub const DEFAULT_CATALOG_URL: &str = "https://pokeapi.co/api/v2/";
pub const DEFAULT_LIST_PATH: &str = "pokemon";

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Config {
    /// dex configuration options
    #[serde(flatten)]
    pub dex: DexConfig,
}

/// Describes the configuration of the dex CLI
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DexConfig {
    /// Directory where dex loads its configuration file (default:
    /// `$XDG_CONFIG_HOME/dex`)
    pub config_dir: PathBuf,

    /// Base URL of the catalog service
    // Using a URL here normalizes away the trailing slash,
    // so just use a String.
    pub catalog_url: String,

    /// Path of the reference list endpoint, relative to `catalog_url`
    pub list_path: String,

    /// How many items each page requests
    pub page_size: NonZeroU32,

    /// How close to the end of the list a scroll asks for more
    pub lookahead: usize,

    /// Custom `User-Agent` sent with catalog requests
    pub user_agent: Option<String>,

    /// Timeout of a whole catalog request
    pub request_timeout_secs: u64,
}

impl DexConfig {
    pub fn catalog_client_config(&self) -> CatalogClientConfig {
        let mut client_config = CatalogClientConfig::new(&self.catalog_url);
        client_config.list_path = self.list_path.clone();
        client_config.timeout = Duration::from_secs(self.request_timeout_secs);
        client_config.user_agent = self
            .user_agent
            .clone()
            .or_else(|| Some(format!("dex/{}", env!("CARGO_PKG_VERSION"))));
        client_config
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            page_size: self.page_size,
            lookahead: self.lookahead,
        }
    }
}

impl Config {
    fn raw_config() -> Result<HierarchicalConfig> {
        let dex_dirs = BaseDirectories::with_prefix(DEX_DIR_NAME);

        let config_dir: PathBuf = match env::var(DEX_CONFIG_DIR_VAR) {
            Ok(v) => {
                debug!("`${DEX_CONFIG_DIR_VAR}` set: {v}");
                v.into()
            },
            Err(_) => {
                let config_dir = dex_dirs
                    .get_config_home()
                    .context("Could not determine the user config directory")?;
                debug!("`${DEX_CONFIG_DIR_VAR}` not set, using {config_dir:?}");
                config_dir
            },
        };

        let mut builder = HierarchicalConfig::builder()
            .set_default("catalog_url", DEFAULT_CATALOG_URL)?
            .set_default("list_path", DEFAULT_LIST_PATH)?
            .set_default("page_size", i64::from(dex_catalog::DEFAULT_PAGE_SIZE.get()))?
            .set_default("lookahead", dex_catalog::DEFAULT_LOOKAHEAD as i64)?
            .set_default("request_timeout_secs", 40_i64)?
            // Config dir is added to the config for completeness;
            // the config file cannot change the config dir.
            .set_override("config_dir", config_dir.to_string_lossy().as_ref())?;

        // read from /etc
        builder = builder.add_source(
            config::File::from(PathBuf::from("/etc").join(DEX_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // look for files in XDG_CONFIG_DIRS locations
        for file in dex_dirs.find_config_files(DEX_CONFIG_FILE) {
            builder = builder.add_source(config::File::from(file).format(config::FileFormat::Toml));
        }

        // Add explicit DEX_CONFIG_DIR file last
        builder = builder.add_source(
            config::File::from(config_dir.join(DEX_CONFIG_FILE))
                .format(config::FileFormat::Toml)
                .required(false),
        );

        // override via env variables
        let builder = builder.add_source(Environment::with_prefix("DEX").try_parsing(true));

        Ok(builder.build()?)
    }

    /// Creates a [Config] from the environment and config file
    pub fn parse() -> Result<Config> {
        let raw_config = Self::raw_config()?;
        let cli_config: Config = raw_config
            .try_deserialize()
            .context("Could not parse config")?;
        debug!(?cli_config, "parsed config");
        Ok(cli_config)
    }
}

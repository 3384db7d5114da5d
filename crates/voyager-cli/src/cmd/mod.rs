pub mod account;
pub mod catalog;
pub mod feed;
pub mod init;
pub mod seed;
pub mod serve;

use anyhow::Context;
use std::path::Path;
use voyager_core::catalog::Catalog;
use voyager_core::config::{ClientConfig, Config};
use voyager_core::{paths, VoyagerError};

/// Client settings from the project config, or the defaults when the
/// project has not been initialized.
pub(crate) fn client_config(root: &Path) -> anyhow::Result<ClientConfig> {
    match Config::load(root) {
        Ok(config) => Ok(config.client),
        Err(VoyagerError::NotInitialized) => Ok(ClientConfig::default()),
        Err(e) => Err(e).context("failed to load config"),
    }
}

/// Open the catalog of an initialized project.
pub(crate) fn open_catalog(root: &Path) -> anyhow::Result<Catalog> {
    Config::load(root)?;
    Catalog::open(&paths::catalog_path(root)).context("failed to open catalog")
}

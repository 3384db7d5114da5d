use std::path::PathBuf;
use std::sync::Arc;

use voyager_core::catalog::Catalog;
use voyager_core::config::Config;
use voyager_core::paths;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub root: PathBuf,
    pub catalog: Arc<Catalog>,
    pub batch_size: usize,
}

impl AppState {
    pub fn new(root: PathBuf, catalog: Catalog, batch_size: usize) -> Self {
        Self {
            root,
            catalog: Arc::new(catalog),
            batch_size,
        }
    }

    /// Load `.voyager/config.yaml` and open the catalog under `root`.
    pub fn open(root: PathBuf) -> voyager_core::Result<Self> {
        let config = Config::load(&root)?;
        for w in config.validate() {
            tracing::warn!(level = ?w.level, "{}", w.message);
        }
        let catalog = Catalog::open(&paths::catalog_path(&root))?;
        Ok(Self::new(root, catalog, config.server.batch_size))
    }
}

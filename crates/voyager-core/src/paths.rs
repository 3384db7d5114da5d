use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const VOYAGER_DIR: &str = ".voyager";
pub const CONFIG_FILE: &str = ".voyager/config.yaml";
pub const CATALOG_FILE: &str = ".voyager/catalog.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn voyager_dir(root: &Path) -> PathBuf {
    root.join(VOYAGER_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn catalog_path(root: &Path) -> PathBuf {
    root.join(CATALOG_FILE)
}

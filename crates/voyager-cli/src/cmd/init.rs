use anyhow::Context;
use std::path::Path;
use voyager_core::catalog::Catalog;
use voyager_core::config::Config;
use voyager_core::paths;

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing Voyager in: {}", root.display());

    if Config::init(root).context("failed to write config.yaml")? {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }

    let catalog_path = paths::catalog_path(root);
    let existed = catalog_path.exists();
    let catalog = Catalog::open(&catalog_path).context("failed to create catalog")?;
    if existed {
        let count = catalog.destination_count()?;
        println!("  exists:  {} ({count} destinations)", paths::CATALOG_FILE);
    } else {
        println!("  created: {}", paths::CATALOG_FILE);
    }

    let config = Config::load(root)?;
    for w in config.validate() {
        eprintln!("  {:?}: {}", w.level, w.message);
    }

    println!("\nNext: voyager seed <destinations.json>");
    Ok(())
}

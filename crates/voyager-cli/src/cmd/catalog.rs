use crate::output::{print_json, print_table, truncate};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum CatalogSubcommand {
    /// List stored destinations (unviewed only by default)
    List {
        /// Include destinations already marked viewed
        #[arg(long)]
        all: bool,
    },
}

pub fn run(root: &Path, subcmd: CatalogSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        CatalogSubcommand::List { all } => list(root, all, json),
    }
}

fn list(root: &Path, all: bool, json: bool) -> anyhow::Result<()> {
    let catalog = super::open_catalog(root)?;
    let destinations = catalog.list_destinations(all)?;

    if json {
        return print_json(&destinations);
    }

    if destinations.is_empty() {
        println!("No destinations. Run `voyager seed <file>` to add some.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = destinations
        .iter()
        .map(|d| {
            vec![
                d.id.to_string(),
                truncate(&d.name, 32),
                truncate(&d.location, 28),
                d.tags.join(", "),
                if d.viewed { "yes" } else { "" }.to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "NAME", "LOCATION", "TAGS", "VIEWED"], &rows);
    Ok(())
}

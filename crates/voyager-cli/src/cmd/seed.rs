use crate::output::print_json;
use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use voyager_core::types::NewDestination;

/// Seed files are either a bare array or `{"destinations": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SeedFile {
    List(Vec<NewDestination>),
    Wrapped { destinations: Vec<NewDestination> },
}

impl SeedFile {
    fn into_destinations(self) -> Vec<NewDestination> {
        match self {
            SeedFile::List(d) | SeedFile::Wrapped { destinations: d } => d,
        }
    }
}

pub fn run(root: &Path, file: &Path, json: bool) -> anyhow::Result<()> {
    let data = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let records = serde_json::from_str::<SeedFile>(&data)
        .with_context(|| format!("failed to parse {}", file.display()))?
        .into_destinations();

    let catalog = super::open_catalog(root)?;
    let total = records.len();
    let report = catalog.import(records).context("import failed")?;

    if json {
        return print_json(&report);
    }

    for d in &report.inserted {
        println!("  added:   {}", d.name);
    }
    for dup in &report.duplicates {
        println!("  skipped: {} (duplicate of {})", dup.name, dup.matches);
    }
    if !report.invalid.is_empty() {
        println!("  invalid: {} record(s) without a name", report.invalid.len());
    }
    println!(
        "Seeded {} of {total} destination(s).",
        report.inserted.len()
    );
    Ok(())
}

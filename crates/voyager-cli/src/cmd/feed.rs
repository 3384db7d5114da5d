use crate::output::{print_json, print_table, truncate};
use clap::Args;
use std::path::Path;
use std::time::Duration;
use voyager_core::feed::{DestinationFilter, FeedClient, Personalization};

#[derive(Args)]
pub struct FeedArgs {
    /// Only destinations matched to your interests
    #[arg(long, conflicts_with = "trending")]
    pub personalized: bool,

    /// Only the general trending set
    #[arg(long)]
    pub trending: bool,

    /// Only destinations carrying this tag (case-insensitive)
    #[arg(long)]
    pub tag: Option<String>,

    /// Backend base URL (default: client.base_url from config)
    #[arg(long)]
    pub url: Option<String>,
}

impl FeedArgs {
    fn filter(&self) -> DestinationFilter {
        let personalization = if self.personalized {
            Personalization::Personalized
        } else if self.trending {
            Personalization::Trending
        } else {
            Personalization::All
        };
        DestinationFilter {
            personalization,
            tag: self.tag.clone(),
        }
    }
}

pub fn run(root: &Path, args: FeedArgs, json: bool) -> anyhow::Result<()> {
    let config = super::client_config(root)?;
    let base_url = args.url.clone().unwrap_or(config.base_url);
    let client = FeedClient::new(base_url, Duration::from_secs(config.timeout_secs))?;

    let rt = tokio::runtime::Runtime::new()?;
    let destinations = rt.block_on(client.load());
    let filter = args.filter();
    let shown = filter.apply(&destinations);

    if json {
        return print_json(&shown);
    }

    if shown.is_empty() {
        println!("No destinations to show right now.");
        return Ok(());
    }

    let rows: Vec<Vec<String>> = shown
        .iter()
        .map(|d| {
            vec![
                truncate(&d.name, 32),
                truncate(&d.location, 28),
                d.tags.join(", "),
                if d.is_personalized { "for you" } else { "trending" }.to_string(),
            ]
        })
        .collect();
    print_table(&["NAME", "LOCATION", "TAGS", "KIND"], &rows);
    Ok(())
}

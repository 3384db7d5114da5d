//! Client for the destination feed and the grid filter applied on top of it.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::http;
use crate::types::{Destination, DestinationRecord};

pub const FEED_PATH: &str = "api/generate-destinations";

// ---------------------------------------------------------------------------
// FeedClient
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct FeedClient {
    base_url: String,
    client: reqwest::Client,
}

impl FeedClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            client: http::build_client(timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the next batch. Every item gets a fresh synthetic id; ids sent
    /// by the server are ignored.
    pub async fn fetch(&self) -> Result<Vec<Destination>> {
        let url = http::join_url(&self.base_url, FEED_PATH);
        let resp = self.client.get(&url).send().await?;
        let records: Vec<DestinationRecord> = http::check(resp).await?.json().await?;
        tracing::debug!(count = records.len(), "fetched destinations");
        Ok(records.into_iter().map(Destination::from).collect())
    }

    /// Like [`fetch`](Self::fetch), but a failure is logged and shows up as
    /// an empty grid. No retry.
    pub async fn load(&self) -> Vec<Destination> {
        match self.fetch().await {
            Ok(destinations) => destinations,
            Err(e) => {
                tracing::warn!(url = %self.base_url, error = %e, "destination fetch failed");
                Vec::new()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DestinationFilter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personalization {
    #[default]
    All,
    /// Matched to the traveler's stated interests.
    Personalized,
    /// The general trending set.
    Trending,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationFilter {
    pub personalization: Personalization,
    pub tag: Option<String>,
}

impl DestinationFilter {
    pub fn matches(&self, d: &Destination) -> bool {
        let personal_ok = match self.personalization {
            Personalization::All => true,
            Personalization::Personalized => d.is_personalized,
            Personalization::Trending => !d.is_personalized,
        };
        personal_ok && self.tag.as_deref().map_or(true, |t| d.has_tag(t))
    }

    /// Keep matching destinations in feed order.
    pub fn apply<'a>(&self, destinations: &'a [Destination]) -> Vec<&'a Destination> {
        destinations.iter().filter(|d| self.matches(d)).collect()
    }
}

//! Per-origin robots.txt cache
//!
//! Each origin's robots.txt is fetched at most once per run. Concurrent
//! lookups for an origin that is still being fetched wait on the same cell.

use crate::crawler::PageFetcher;
use crate::robots::ParsedRobots;
use crate::url::origin_key;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use url::Url;

type Slot = Arc<OnceCell<Arc<ParsedRobots>>>;

/// Run-scoped robots.txt cache keyed by origin
pub struct RobotsCache {
    fetcher: Arc<dyn PageFetcher>,
    agent: String,
    enabled: bool,
    entries: Mutex<HashMap<String, Slot>>,
}

impl RobotsCache {
    /// Creates a cache that fetches through `fetcher` and matches rules for `agent`
    ///
    /// When `enabled` is false nothing is fetched and every URL is allowed.
    pub fn new(fetcher: Arc<dyn PageFetcher>, agent: impl Into<String>, enabled: bool) -> Self {
        Self {
            fetcher,
            agent: agent.into(),
            enabled,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the robots.txt rules for the URL's origin, fetching and parsing them on first use
    pub async fn rules_for(&self, url: &Url) -> Arc<ParsedRobots> {
        if !self.enabled {
            return Arc::new(ParsedRobots::allow_all());
        }

        let key = origin_key(url);
        let slot = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.entry(key.clone()).or_default().clone()
        };

        slot.get_or_init(|| async {
            let robots = self.fetch_rules(url).await;
            Arc::new(robots)
        })
        .await
        .clone()
    }

    /// Checks whether the URL may be fetched
    pub async fn is_allowed(&self, url: &Url) -> bool {
        self.rules_for(url).await.is_allowed(url)
    }

    /// Number of origins whose robots.txt has been resolved
    pub fn len(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.values().filter(|slot| slot.initialized()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn fetch_rules(&self, url: &Url) -> ParsedRobots {
        let robots_url = match url.join("/robots.txt") {
            Ok(u) => u,
            Err(_) => return ParsedRobots::allow_all(),
        };

        match self.fetcher.fetch(&robots_url).await {
            Ok(page) if page.is_success() => {
                tracing::debug!("Loaded {}", robots_url);
                ParsedRobots::parse(&page.body, &self.agent)
            }
            Ok(page) => {
                tracing::debug!(
                    "{} returned HTTP {}; allowing all paths",
                    robots_url,
                    page.status
                );
                ParsedRobots::allow_all()
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}; allowing all paths", robots_url, e);
                ParsedRobots::allow_all()
            }
        }
    }
}

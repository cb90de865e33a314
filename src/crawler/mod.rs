//! Crawler module for web page fetching and run orchestration
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`PageFetcher`] capability
//! - The frontier queue with its run-scoped seen-set
//! - Politeness: concurrency caps and adaptive per-host delays
//! - Overall run coordination and cancellation

mod controller;
mod fetcher;
mod frontier;
mod politeness;
mod stop;

pub use controller::{RunController, RunReport};
pub use fetcher::{
    build_http_client, FetchError, FetchedPage, HttpFetcher, PageFetcher, ACCEPT_HTML, MAX_REDIRECTS,
};
pub use frontier::{Frontier, FrontierEntry, InFlight};
pub use politeness::{Politeness, RequestPermit};
pub use stop::{StopReason, StopSignal};

use crate::config::Config;

/// Runs a complete crawl with the production capabilities
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Build the HTTP fetcher, embedding client and Qdrant client
/// 2. Validate the configuration and open the ingestion pipeline
/// 3. Fetch pages, extract documents and follow links
/// 4. Close the pipeline and report the outcome
///
/// # Example
///
/// ```no_run
/// use site_indexer::config::load_config;
/// use site_indexer::crawler::crawl;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let report = crawl(config).await?;
/// println!("{} documents indexed", report.counts().indexed);
/// # Ok(())
/// # }
/// ```
pub async fn crawl(config: Config) -> crate::Result<RunReport> {
    Ok(RunController::from_config(config)?.run().await)
}

//! Run controller - main crawl orchestration logic
//!
//! This module drives one run through its lifecycle:
//! - Validating the configuration and opening the ingestion pipeline
//! - Seeding the frontier and spawning fetch and ingestion workers
//! - Checking robots.txt, fetching with retries, extracting and enqueueing links
//! - Stopping on drain, operator request or budget exhaustion
//! - Closing the pipeline and producing the run report

use crate::config::{validate, Config};
use crate::crawler::fetcher::{FetchError, FetchedPage, HttpFetcher, PageFetcher};
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::politeness::Politeness;
use crate::crawler::stop::{StopReason, StopSignal};
use crate::embedding::{Embedder, HttpEmbedder};
use crate::extract::{extract, Document};
use crate::output::{CountSnapshot, RunCounters, RunSummary};
use crate::pipeline::IngestionPipeline;
use crate::robots::RobotsCache;
use crate::state::{RunState, SkipReason, UrlRecord, UrlStatus};
use crate::url::{normalize_url, CrawlScope, LinkVerdict};
use crate::vector_store::{QdrantStore, VectorStore};
use crate::IndexerError;
use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Pages between progress lines
const PROGRESS_EVERY: u64 = 10;

/// Outcome of a run, returned whatever happened
#[derive(Debug, Clone)]
pub struct RunReport {
    /// DRAINED, CANCELLED or FAILED
    pub state: RunState,

    /// Set when the run was cancelled
    pub stop_reason: Option<StopReason>,

    /// Set when the run failed during setup
    pub error: Option<String>,

    pub summary: RunSummary,

    /// Every URL seen during the run with its final status, sorted by URL
    pub records: Vec<UrlRecord>,

    /// URLs still queued when the run ended
    pub remaining: usize,
}

impl RunReport {
    pub fn counts(&self) -> &CountSnapshot {
        &self.summary.counts
    }

    /// Returns true unless the run failed
    pub fn is_success(&self) -> bool {
        self.state != RunState::Failed
    }

    pub fn status_of(&self, url: &str) -> Option<UrlStatus> {
        self.records
            .iter()
            .find(|r| r.url == url)
            .map(|r| r.status)
    }
}

#[derive(Debug, Error)]
enum CrawlFailure {
    #[error("HTTP {0}")]
    Status(u16),

    #[error(transparent)]
    Transport(#[from] FetchError),

    /// The run stopped before the URL reached a final outcome
    #[error("run stopping")]
    Stopped,
}

/// Shared state of the fetch workers
struct CrawlContext {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    frontier: Arc<Frontier>,
    robots: RobotsCache,
    politeness: Politeness,
    scope: CrawlScope,
    counters: Arc<RunCounters>,
    stop: StopSignal,
    pages_started: AtomicU64,
    started: Instant,
}

/// Drives one crawl-and-index run
///
/// A controller runs once; take a [`stop_handle`](Self::stop_handle) before
/// calling [`run`](Self::run) to cancel it from elsewhere.
pub struct RunController {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    stop: StopSignal,
}

impl RunController {
    /// Creates a controller over explicit capabilities
    pub fn new(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
            embedder,
            store,
            stop: StopSignal::new(),
        }
    }

    /// Creates a controller with the HTTP fetcher, HTTP embedder and Qdrant store
    pub fn from_config(config: Config) -> Result<Self, IndexerError> {
        let fetcher = Arc::new(HttpFetcher::new(&config)?);
        let embedder = Arc::new(HttpEmbedder::new(&config.embedding)?);
        let store = Arc::new(QdrantStore::new(&config.vector_store)?);
        Ok(Self::new(config, fetcher, embedder, store))
    }

    /// Handle that cancels the run when stopped
    pub fn stop_handle(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Runs the crawl to completion
    ///
    /// Never returns an error: setup failures end in `FAILED`, and every
    /// per-URL or per-document failure is counted in the report.
    pub async fn run(self) -> RunReport {
        let started = Instant::now();
        let counters = Arc::new(RunCounters::new());
        let state = RunState::Init;

        info!(
            "Starting run: {} seed(s), max depth {}, concurrency {}",
            self.config.crawler.seeds.len(),
            self.config.crawler.max_depth,
            self.config.crawler.concurrency
        );

        let (scope, pipeline) = match self.setup(counters.clone()).await {
            Ok(ready) => ready,
            Err(e) => {
                error!("Run setup failed: {}", e);
                return self.fail(state, e, &counters, started);
            }
        };

        let state = advance(state, RunState::Running);
        let pipeline = Arc::new(pipeline);
        let frontier = Arc::new(Frontier::new());

        let ctx = Arc::new(CrawlContext {
            robots: RobotsCache::new(
                self.fetcher.clone(),
                self.config.user_agent.crawler_name.clone(),
                self.config.politeness.respect_robots,
            ),
            politeness: Politeness::new(&self.config),
            config: self.config.clone(),
            fetcher: self.fetcher.clone(),
            frontier: frontier.clone(),
            scope,
            counters: counters.clone(),
            stop: self.stop.clone(),
            pages_started: AtomicU64::new(0),
            started,
        });

        ctx.seed();

        let timer = self.config.crawler.max_duration().map(|limit| {
            let stop = self.stop.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(limit) => {
                        if stop.stop(StopReason::TimeBudget) {
                            info!("Time budget of {:?} reached, stopping", limit);
                        }
                    }
                    _ = stop.stopped() => {}
                }
            })
        });

        let (tx, rx) = mpsc::channel::<Document>(self.config.pipeline.queue_capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let ingest_workers: Vec<_> = (0..self.config.pipeline.workers)
            .map(|id| {
                let rx = rx.clone();
                let pipeline = pipeline.clone();
                tokio::spawn(async move {
                    loop {
                        let next = rx.lock().await.recv().await;
                        match next {
                            Some(doc) => {
                                pipeline.process(doc).await;
                            }
                            None => break,
                        }
                    }
                    debug!("Ingestion worker {} finished", id);
                })
            })
            .collect();

        let fetch_workers: Vec<_> = (0..self.config.crawler.concurrency)
            .map(|id| {
                let ctx = ctx.clone();
                let tx = tx.clone();
                tokio::spawn(async move { ctx.worker_loop(id, tx).await })
            })
            .collect();
        drop(tx);

        for handle in fetch_workers {
            if let Err(e) = handle.await {
                error!("Fetch worker panicked: {}", e);
            }
        }
        for handle in ingest_workers {
            if let Err(e) = handle.await {
                error!("Ingestion worker panicked: {}", e);
            }
        }
        if let Some(timer) = timer {
            timer.abort();
        }

        let stop_reason = self.stop.reason();
        let outcome = match stop_reason {
            Some(reason) => {
                info!("Run cancelled: {}", reason);
                RunState::Cancelled
            }
            None => {
                info!("Frontier drained");
                RunState::Drained
            }
        };
        let state = advance(state, outcome);

        let closed = pipeline.close().await;
        let summary = RunSummary {
            state,
            counts: counters.snapshot(),
            elapsed: started.elapsed(),
            collection_size: closed.collection_size,
            snapshot_path: closed.snapshot_path,
        };
        log_summary(&summary);
        let terminated = advance(state, RunState::Terminated);
        debug!("Run {}", terminated);

        RunReport {
            state,
            stop_reason,
            error: None,
            summary,
            records: frontier.records(),
            remaining: frontier.len(),
        }
    }

    async fn setup(
        &self,
        counters: Arc<RunCounters>,
    ) -> Result<(CrawlScope, IngestionPipeline), IndexerError> {
        validate(&self.config)?;
        let scope = CrawlScope::from_config(&self.config)?;
        let pipeline = IngestionPipeline::open(
            &self.config,
            self.embedder.clone(),
            self.store.clone(),
            counters,
        )
        .await?;
        Ok((scope, pipeline))
    }

    fn fail(
        &self,
        state: RunState,
        err: IndexerError,
        counters: &RunCounters,
        started: Instant,
    ) -> RunReport {
        let state = advance(state, RunState::Failed);
        let summary = RunSummary {
            state,
            counts: counters.snapshot(),
            elapsed: started.elapsed(),
            collection_size: None,
            snapshot_path: None,
        };
        log_summary(&summary);
        advance(state, RunState::Terminated);

        RunReport {
            state,
            stop_reason: None,
            error: Some(err.to_string()),
            summary,
            records: Vec::new(),
            remaining: 0,
        }
    }
}

impl CrawlContext {
    /// Queues the configured seeds at depth 0
    fn seed(&self) {
        for raw in &self.config.crawler.seeds {
            let url = match normalize_url(raw, None) {
                Ok(url) => url,
                Err(e) => {
                    warn!("Skipping invalid seed {}: {}", raw, e);
                    self.skip(raw, 0, SkipReason::InvalidUrl);
                    continue;
                }
            };

            match self.scope.classify(&url) {
                LinkVerdict::Crawl => {
                    self.frontier.enqueue(&url, 0);
                }
                LinkVerdict::Excluded => {
                    info!("Seed {} matches an exclusion pattern, skipping", url);
                    self.skip(url.as_str(), 0, SkipReason::Excluded);
                }
                LinkVerdict::TooLong => {
                    warn!("Seed {} exceeds the URL length limit, skipping", url);
                    self.skip(url.as_str(), 0, SkipReason::InvalidUrl);
                }
                LinkVerdict::OutOfScope => {
                    warn!("Seed {} is outside the allowed hosts, skipping", url);
                }
            }
        }
        info!("Seeded frontier with {} URL(s)", self.frontier.len());
    }

    fn skip(&self, url: &str, depth: u32, reason: SkipReason) {
        if self.frontier.record_skipped(url, depth, reason) {
            self.counters.record_url_skipped();
        }
    }

    async fn worker_loop(&self, id: usize, tx: mpsc::Sender<Document>) {
        while let Some(task) = self.frontier.take(&self.stop).await {
            let outcome = self.crawl_one(task.entry(), &tx).await;
            match outcome {
                Some(status) => task.complete(status),
                None => task.release(),
            }
        }
        debug!("Fetch worker {} finished", id);
    }

    /// Processes one URL; `None` means it was given up without a fetch
    async fn crawl_one(
        &self,
        entry: &FrontierEntry,
        tx: &mpsc::Sender<Document>,
    ) -> Option<UrlStatus> {
        let url = &entry.url;

        let robots = self.robots.rules_for(url).await;
        if !robots.is_allowed(url) {
            debug!("URL {} disallowed by robots.txt", url);
            self.counters.record_url_skipped();
            return Some(UrlStatus::Skipped(SkipReason::RobotsDisallowed));
        }

        if !self.take_page_budget() {
            if self.stop.stop(StopReason::PageBudget) {
                info!(
                    "Page budget of {} reached, stopping",
                    self.config.crawler.max_pages
                );
            }
            return None;
        }

        let crawl_delay = robots.crawl_delay();
        let page = match self.fetch_with_retry(url, crawl_delay).await {
            Ok(page) => page,
            Err(CrawlFailure::Stopped) => {
                debug!("Run stopping, giving up {} before completion", url);
                return None;
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", url, e);
                self.counters.record_page_failed();
                return Some(UrlStatus::Failed);
            }
        };

        self.counters.record_page_fetched();
        self.log_progress();

        let page_url = normalize_url(page.final_url.as_str(), None).unwrap_or_else(|_| url.clone());
        let mut depth = entry.depth;
        if page_url != *url {
            debug!("{} redirected to {}", url, page_url);
            if self.scope.classify(&page_url) != LinkVerdict::Crawl {
                debug!("Redirect target {} is outside the crawl scope", page_url);
                return Some(UrlStatus::Fetched);
            }
            match self.frontier.claim_redirect_target(&page_url, entry.depth) {
                Some(claimed) => depth = claimed,
                None => {
                    debug!("Redirect target {} already handled this run", page_url);
                    return Some(UrlStatus::Fetched);
                }
            }
        }

        if !page.is_html() {
            debug!(
                "Not extracting {}: content type {:?}",
                page_url, page.content_type
            );
            return Some(UrlStatus::Fetched);
        }

        let extraction = extract(&page.body, &page_url, &self.scope, Utc::now());
        let links = extraction.links;
        let child_depth = depth + 1;

        if child_depth <= self.config.crawler.max_depth {
            let queued = links
                .candidates
                .iter()
                .filter(|link| self.frontier.enqueue(link, child_depth))
                .count();
            debug!(
                "{}: {} new link(s) queued at depth {}",
                page_url, queued, child_depth
            );
        }
        for link in &links.excluded {
            self.skip(link.as_str(), child_depth, SkipReason::Excluded);
        }
        for raw in &links.invalid {
            self.skip(raw, child_depth, SkipReason::InvalidUrl);
        }

        if let Some(doc) = extraction.document {
            self.counters.record_document_extracted();
            if tx.send(doc).await.is_err() {
                error!("Ingestion channel closed, dropping document for {}", page_url);
            }
        }

        Some(UrlStatus::Fetched)
    }

    /// Claims one page of the `max-pages` budget
    fn take_page_budget(&self) -> bool {
        let max = self.config.crawler.max_pages;
        max == 0 || self.pages_started.fetch_add(1, Ordering::SeqCst) < max
    }

    /// Fetches a URL, retrying transient failures with exponential backoff
    async fn fetch_with_retry(
        &self,
        url: &Url,
        crawl_delay: Option<Duration>,
    ) -> Result<FetchedPage, CrawlFailure> {
        let retry = &self.config.retry;
        let mut attempt: u32 = 0;

        loop {
            let permit = self
                .politeness
                .acquire(url, crawl_delay, &self.stop)
                .await
                .ok_or(CrawlFailure::Stopped)?;
            let sent = Instant::now();
            let result = self.fetcher.fetch(url).await;
            drop(permit);

            let failure = match result {
                Ok(page) => {
                    self.politeness
                        .record_response(url, Some(page.status), page.elapsed);
                    if page.is_success() {
                        return Ok(page);
                    }
                    if !retry.is_retryable_status(page.status) {
                        return Err(CrawlFailure::Status(page.status));
                    }
                    CrawlFailure::Status(page.status)
                }
                Err(e) => {
                    self.politeness.record_response(url, None, sent.elapsed());
                    if !e.is_transient() {
                        return Err(e.into());
                    }
                    CrawlFailure::Transport(e)
                }
            };

            if attempt >= retry.max_retries {
                debug!("Giving up on {} after {} retries", url, attempt);
                return Err(failure);
            }
            attempt += 1;

            let backoff = retry.backoff(attempt);
            debug!(
                "Retrying {} in {:?} after {} (retry {}/{})",
                url, backoff, failure, attempt, retry.max_retries
            );
            tokio::select! {
                _ = tokio::time::sleep(backoff) => {}
                _ = self.stop.stopped() => return Err(CrawlFailure::Stopped),
            }
        }
    }

    fn log_progress(&self) {
        let fetched = self.counters.pages_fetched();
        if fetched % PROGRESS_EVERY == 0 {
            let rate = fetched as f64 / self.started.elapsed().as_secs_f64().max(0.001);
            info!(
                "Progress: {} pages fetched, {} in frontier, {:.2} pages/sec",
                fetched,
                self.frontier.len(),
                rate
            );
        }
    }
}

/// Applies a lifecycle transition the controller knows to be legal
fn advance(from: RunState, to: RunState) -> RunState {
    match from.transition(to) {
        Ok(next) => next,
        Err(e) => {
            error!("{}", e);
            from
        }
    }
}

fn log_summary(summary: &RunSummary) {
    let c = &summary.counts;
    info!(
        state = %summary.state,
        pages_fetched = c.pages_fetched,
        pages_failed = c.pages_failed,
        urls_skipped = c.urls_skipped,
        processed = c.processed,
        indexed = c.indexed,
        skipped = c.skipped,
        failed = c.failed,
        "Run finished in {:.1}s",
        summary.elapsed.as_secs_f64()
    );
}

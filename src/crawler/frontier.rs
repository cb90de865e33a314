//! Crawl frontier: FIFO queue, seen-set and per-URL records for one run
//!
//! Enqueue checks and updates the seen-set under the same lock, so a URL
//! discovered by several workers at once is queued exactly once.

use crate::crawler::StopSignal;
use crate::state::{SkipReason, UrlRecord, UrlStatus};
use crate::url::extract_host;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::Notify;
use url::Url;

/// A URL handed to a fetch worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: Url,
    pub depth: u32,
}

enum Poll {
    Ready(FrontierEntry),
    Wait,
    Drained,
}

#[derive(Default)]
struct Inner {
    queue: VecDeque<FrontierEntry>,
    records: HashMap<String, UrlRecord>,
    in_flight: usize,
}

/// Work queue shared by all fetch workers
#[derive(Default)]
pub struct Frontier {
    inner: Mutex<Inner>,
    changed: Notify,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queues a normalized URL unless it is already known this run
    ///
    /// Returns true if the URL was queued.
    pub fn enqueue(&self, url: &Url, depth: u32) -> bool {
        {
            let mut inner = self.lock();
            if inner.records.contains_key(url.as_str()) {
                return false;
            }
            inner
                .records
                .insert(url.to_string(), pending_record(url, depth));
            inner.queue.push_back(FrontierEntry {
                url: url.clone(),
                depth,
            });
        }
        self.changed.notify_waiters();
        true
    }

    /// Records a URL that will never be fetched this run
    ///
    /// A URL already known keeps its existing record. Returns true if the skip
    /// was recorded.
    pub fn record_skipped(&self, url: &str, depth: u32, reason: SkipReason) -> bool {
        let mut inner = self.lock();
        if inner.records.contains_key(url) {
            return false;
        }
        let host = Url::parse(url)
            .ok()
            .and_then(|u| extract_host(&u))
            .unwrap_or_default();
        inner.records.insert(
            url.to_string(),
            UrlRecord {
                url: url.to_string(),
                depth,
                host,
                status: UrlStatus::Skipped(reason),
            },
        );
        true
    }

    /// Claims the target of a redirect for the page that was just fetched from it
    ///
    /// An unknown target is recorded as fetched. A target still waiting in the
    /// queue is taken off it, so it is not fetched a second time. Returns the
    /// depth to process the page at, or `None` if the target was already
    /// fetched, is in flight or was skipped.
    pub fn claim_redirect_target(&self, url: &Url, depth: u32) -> Option<u32> {
        let mut inner = self.lock();
        let known = inner.records.get(url.as_str()).map(|r| r.status);
        match known {
            None => {
                let mut rec = pending_record(url, depth);
                rec.status = UrlStatus::Fetched;
                inner.records.insert(url.to_string(), rec);
                Some(depth)
            }
            Some(UrlStatus::Pending) => {
                let pos = inner.queue.iter().position(|e| e.url == *url)?;
                let queued = inner.queue.remove(pos)?;
                let depth = depth.min(queued.depth);
                if let Some(rec) = inner.records.get_mut(url.as_str()) {
                    rec.status = UrlStatus::Fetched;
                    rec.depth = depth;
                }
                Some(depth)
            }
            Some(_) => None,
        }
    }

    fn poll(&self) -> Poll {
        let mut inner = self.lock();
        match inner.queue.pop_front() {
            Some(entry) => {
                inner.in_flight += 1;
                Poll::Ready(entry)
            }
            None if inner.in_flight == 0 => Poll::Drained,
            None => Poll::Wait,
        }
    }

    /// Takes the next URL, waiting while other workers may still discover links
    ///
    /// Returns `None` once the frontier is drained or the run is stopping.
    /// Every entry returned must be handed back through [`complete`](Self::complete)
    /// or [`release`](Self::release).
    pub async fn next(&self, stop: &StopSignal) -> Option<FrontierEntry> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if stop.is_stopped() {
                return None;
            }

            match self.poll() {
                Poll::Ready(entry) => return Some(entry),
                Poll::Drained => return None,
                Poll::Wait => {
                    tokio::select! {
                        _ = &mut notified => {}
                        _ = stop.stopped() => return None,
                    }
                }
            }
        }
    }

    /// Takes the next URL wrapped in a guard that settles it if dropped unsettled
    pub async fn take(self: &Arc<Self>, stop: &StopSignal) -> Option<InFlight> {
        let entry = self.next(stop).await?;
        Some(InFlight {
            frontier: self.clone(),
            entry,
            settled: false,
        })
    }

    /// Marks an in-flight URL finished with its final status
    pub fn complete(&self, url: &Url, status: UrlStatus) {
        {
            let mut inner = self.lock();
            if let Some(rec) = inner.records.get_mut(url.as_str()) {
                rec.status = status;
            }
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Gives up an in-flight URL without fetching it; its record stays pending
    pub fn release(&self, url: &Url) {
        tracing::trace!(url = %url, "Released without fetching");
        {
            let mut inner = self.lock();
            inner.in_flight = inner.in_flight.saturating_sub(1);
        }
        self.changed.notify_waiters();
    }

    /// Number of URLs waiting to be fetched
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of distinct URLs seen this run, fetched or not
    pub fn seen(&self) -> usize {
        self.lock().records.len()
    }

    pub fn status_of(&self, url: &str) -> Option<UrlStatus> {
        self.lock().records.get(url).map(|r| r.status)
    }

    /// All records, sorted by URL
    pub fn records(&self) -> Vec<UrlRecord> {
        let mut records: Vec<UrlRecord> = self.lock().records.values().cloned().collect();
        records.sort_by(|a, b| a.url.cmp(&b.url));
        records
    }
}

/// A URL a worker has taken from the frontier
///
/// Dropping it without calling [`complete`](Self::complete) or
/// [`release`](Self::release), as happens when the worker panics, marks the
/// URL failed so other workers do not wait on it forever.
pub struct InFlight {
    frontier: Arc<Frontier>,
    entry: FrontierEntry,
    settled: bool,
}

impl InFlight {
    pub fn entry(&self) -> &FrontierEntry {
        &self.entry
    }

    pub fn complete(mut self, status: UrlStatus) {
        self.settled = true;
        self.frontier.complete(&self.entry.url, status);
    }

    pub fn release(mut self) {
        self.settled = true;
        self.frontier.release(&self.entry.url);
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("{} abandoned while in flight, marking failed", self.entry.url);
            self.frontier.complete(&self.entry.url, UrlStatus::Failed);
        }
    }
}

fn pending_record(url: &Url, depth: u32) -> UrlRecord {
    UrlRecord {
        url: url.to_string(),
        depth,
        host: extract_host(url).unwrap_or_default(),
        status: UrlStatus::Pending,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::StopReason;
    use std::sync::Arc;
    use std::time::Duration;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_enqueue_dedup() {
        let frontier = Frontier::new();
        assert!(frontier.enqueue(&url("https://example.org/a"), 0));
        assert!(!frontier.enqueue(&url("https://example.org/a"), 1));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.seen(), 1);
    }

    #[test]
    fn test_skipped_url_is_never_queued() {
        let frontier = Frontier::new();
        assert!(frontier.record_skipped("https://example.org/login", 1, SkipReason::Excluded));
        assert!(!frontier.enqueue(&url("https://example.org/login"), 1));
        assert!(frontier.is_empty());
        assert_eq!(
            frontier.status_of("https://example.org/login"),
            Some(UrlStatus::Skipped(SkipReason::Excluded))
        );
    }

    #[test]
    fn test_concurrent_enqueue_queues_once() {
        let frontier = Arc::new(Frontier::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let frontier = frontier.clone();
                std::thread::spawn(move || frontier.enqueue(&url("https://example.org/shared"), 1))
            })
            .collect();

        let queued = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|q| *q)
            .count();
        assert_eq!(queued, 1);
        assert_eq!(frontier.len(), 1);
    }

    #[tokio::test]
    async fn test_fifo_and_drain() {
        let frontier = Frontier::new();
        let stop = StopSignal::new();
        frontier.enqueue(&url("https://example.org/1"), 0);
        frontier.enqueue(&url("https://example.org/2"), 0);

        let first = frontier.next(&stop).await.unwrap();
        assert_eq!(first.url.path(), "/1");
        frontier.complete(&first.url, UrlStatus::Fetched);

        let second = frontier.next(&stop).await.unwrap();
        assert_eq!(second.url.path(), "/2");
        frontier.complete(&second.url, UrlStatus::Failed);

        assert!(frontier.next(&stop).await.is_none());
        assert_eq!(frontier.status_of("https://example.org/2"), Some(UrlStatus::Failed));
    }

    #[tokio::test]
    async fn test_waiter_wakes_on_discovery() {
        let frontier = Arc::new(Frontier::new());
        let stop = StopSignal::new();
        frontier.enqueue(&url("https://example.org/"), 0);
        let seed = frontier.next(&stop).await.unwrap();

        // Queue is empty but the seed is in flight, so this must wait
        let waiter = {
            let frontier = frontier.clone();
            let stop = stop.clone();
            tokio::spawn(async move { frontier.next(&stop).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        frontier.enqueue(&url("https://example.org/child"), 1);
        frontier.complete(&seed.url, UrlStatus::Fetched);

        let child = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(child.depth, 1);
    }

    #[test]
    fn test_redirect_target_claims() {
        let frontier = Frontier::new();
        frontier.enqueue(&url("https://example.org/old"), 1);
        frontier.enqueue(&url("https://example.org/new"), 1);

        // Queued target is taken off the queue
        assert_eq!(frontier.claim_redirect_target(&url("https://example.org/new"), 2), Some(1));
        assert_eq!(frontier.len(), 1);
        assert_eq!(frontier.status_of("https://example.org/new"), Some(UrlStatus::Fetched));

        // Already fetched
        assert_eq!(frontier.claim_redirect_target(&url("https://example.org/new"), 1), None);

        // Unknown target
        assert_eq!(frontier.claim_redirect_target(&url("https://example.org/moved"), 2), Some(2));
        assert!(!frontier.enqueue(&url("https://example.org/moved"), 2));

        // Skipped target
        frontier.record_skipped("https://example.org/login", 1, SkipReason::Excluded);
        assert_eq!(frontier.claim_redirect_target(&url("https://example.org/login"), 1), None);
    }

    #[tokio::test]
    async fn test_redirect_target_in_flight_is_not_claimed() {
        let frontier = Frontier::new();
        let stop = StopSignal::new();
        frontier.enqueue(&url("https://example.org/new"), 0);
        let _taken = frontier.next(&stop).await.unwrap();
        assert_eq!(frontier.claim_redirect_target(&url("https://example.org/new"), 1), None);
    }

    #[tokio::test]
    async fn test_abandoned_entry_fails_and_wakes_waiters() {
        let frontier = Arc::new(Frontier::new());
        let stop = StopSignal::new();
        frontier.enqueue(&url("https://example.org/"), 0);
        let task = frontier.take(&stop).await.unwrap();

        let waiter = {
            let frontier = frontier.clone();
            let stop = stop.clone();
            tokio::spawn(async move { frontier.next(&stop).await })
        };

        let crashed = tokio::spawn(async move {
            let _task = task;
            panic!("worker crashed");
        });
        assert!(crashed.await.unwrap_err().is_panic());

        let next = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(next.is_none());
        assert_eq!(frontier.status_of("https://example.org/"), Some(UrlStatus::Failed));
    }

    #[tokio::test]
    async fn test_settled_entry_keeps_its_status() {
        let frontier = Arc::new(Frontier::new());
        let stop = StopSignal::new();
        frontier.enqueue(&url("https://example.org/"), 0);

        let task = frontier.take(&stop).await.unwrap();
        assert_eq!(task.entry().depth, 0);
        task.complete(UrlStatus::Fetched);
        assert_eq!(frontier.status_of("https://example.org/"), Some(UrlStatus::Fetched));
        assert!(frontier.take(&stop).await.is_none());
    }

    #[tokio::test]
    async fn test_stop_ends_waiting() {
        let frontier = Arc::new(Frontier::new());
        let stop = StopSignal::new();
        frontier.enqueue(&url("https://example.org/"), 0);
        let _seed = frontier.next(&stop).await.unwrap();

        let waiter = {
            let frontier = frontier.clone();
            let stop = stop.clone();
            tokio::spawn(async move { frontier.next(&stop).await })
        };
        stop.stop(StopReason::Requested);

        let next = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(next.is_none());
    }
}

//! Politeness gate for outgoing requests
//!
//! This module handles:
//! - Global concurrency limiting via a semaphore
//! - Per-host concurrency limiting via one semaphore per origin
//! - Spacing request starts per host with jitter
//! - Feeding response health into each host's adaptive throttle

use crate::config::{Config, PolitenessConfig};
use crate::crawler::StopSignal;
use crate::state::HostThrottle;
use crate::url::origin_key;
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

struct HostEntry {
    throttle: HostThrottle,
    semaphore: Arc<Semaphore>,
    crawl_delay_applied: bool,
}

/// Permits held for the duration of one request
pub struct RequestPermit {
    _host: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

/// Shared gate every fetch passes through
pub struct Politeness {
    config: PolitenessConfig,
    global: Arc<Semaphore>,
    per_host_limit: usize,
    hosts: Mutex<HashMap<String, HostEntry>>,
}

impl Politeness {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.politeness.clone(),
            global: Arc::new(Semaphore::new(config.crawler.concurrency)),
            per_host_limit: config.crawler.per_host_concurrency,
            hosts: Mutex::new(HashMap::new()),
        }
    }

    fn with_host<T>(&self, url: &Url, f: impl FnOnce(&mut HostEntry) -> T) -> T {
        let mut hosts = self.hosts.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = hosts.entry(origin_key(url)).or_insert_with(|| HostEntry {
            throttle: HostThrottle::new(&self.config),
            semaphore: Arc::new(Semaphore::new(self.per_host_limit)),
            crawl_delay_applied: false,
        });
        f(entry)
    }

    /// Waits until a request to `url` may start
    ///
    /// A robots.txt crawl delay is applied to the host the first time one is
    /// seen. Returns `None` if the run stops while waiting.
    pub async fn acquire(
        &self,
        url: &Url,
        crawl_delay: Option<Duration>,
        stop: &StopSignal,
    ) -> Option<RequestPermit> {
        let host_semaphore = self.with_host(url, |entry| {
            if let Some(delay) = crawl_delay {
                if !entry.crawl_delay_applied {
                    entry.throttle.apply_crawl_delay(delay, &self.config);
                    entry.crawl_delay_applied = true;
                    tracing::debug!(
                        "Applied crawl delay {:?} to {}, baseline now {:?}",
                        delay,
                        url,
                        entry.throttle.baseline()
                    );
                }
            }
            entry.semaphore.clone()
        });
        let host_permit = tokio::select! {
            permit = host_semaphore.acquire_owned() => permit.ok()?,
            _ = stop.stopped() => return None,
        };

        let jitter = self.jitter();
        let start = self.with_host(url, |entry| entry.throttle.reserve(Instant::now(), jitter));
        tokio::select! {
            _ = tokio::time::sleep_until(tokio::time::Instant::from_std(start)) => {}
            _ = stop.stopped() => return None,
        }

        let global_permit = tokio::select! {
            permit = self.global.clone().acquire_owned() => permit.ok()?,
            _ = stop.stopped() => return None,
        };

        Some(RequestPermit {
            _host: host_permit,
            _global: global_permit,
        })
    }

    /// Feeds one response outcome into the host's throttle
    ///
    /// `status` is `None` for transport failures.
    pub fn record_response(&self, url: &Url, status: Option<u16>, elapsed: Duration) {
        let healthy = self.is_healthy(status, elapsed);
        let config = &self.config;
        self.with_host(url, |entry| {
            let before = entry.throttle.current_delay();
            entry.throttle.record_response(healthy, config);
            let after = entry.throttle.current_delay();
            if after != before {
                tracing::debug!("Delay for {} adjusted {:?} -> {:?}", url, before, after);
            }
        });
    }

    /// Current delay between request starts for the URL's host
    pub fn current_delay(&self, url: &Url) -> Duration {
        self.with_host(url, |entry| entry.throttle.current_delay())
    }

    fn is_healthy(&self, status: Option<u16>, elapsed: Duration) -> bool {
        let slow = elapsed >= Duration::from_millis(self.config.slow_response_ms);
        match status {
            Some(code) => code < 500 && code != 429 && !slow,
            None => false,
        }
    }

    fn jitter(&self) -> Duration {
        if self.config.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=self.config.jitter_ms))
    }
}

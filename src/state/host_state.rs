use crate::config::PolitenessConfig;
use std::time::{Duration, Instant};

/// Adaptive request pacing for a single host
///
/// The delay between request starts follows an AIMD loop bounded by the
/// configured minimum and maximum delay:
/// - an unhealthy response (error status, transport failure or slow reply)
///   multiplies the delay by `backoff-factor`
/// - every `recovery-after` consecutive healthy responses subtract
///   `recovery-step-ms`, never going below the baseline
#[derive(Debug, Clone)]
pub struct HostThrottle {
    /// Delay the host recovers towards
    baseline: Duration,

    /// Delay currently applied between request starts
    current: Duration,

    /// Consecutive healthy responses since the last adjustment
    healthy_streak: u32,

    /// Earliest instant the next request may start
    next_slot: Option<Instant>,
}

impl HostThrottle {
    /// Creates a throttle at the configured baseline delay
    pub fn new(config: &PolitenessConfig) -> Self {
        let baseline = clamp(Duration::from_millis(config.base_delay_ms), config);
        Self {
            baseline,
            current: baseline,
            healthy_streak: 0,
            next_slot: None,
        }
    }

    pub fn baseline(&self) -> Duration {
        self.baseline
    }

    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Raises the baseline to a robots.txt crawl delay, capped at the maximum delay
    pub fn apply_crawl_delay(&mut self, crawl_delay: Duration, config: &PolitenessConfig) {
        let raised = clamp(crawl_delay, config);
        if raised > self.baseline {
            self.baseline = raised;
        }
        if self.current < self.baseline {
            self.current = self.baseline;
        }
    }

    /// Reserves the next request slot and returns when that request may start
    ///
    /// `jitter` is added after the slot so that consecutive requests are spaced
    /// by at least the current delay.
    pub fn reserve(&mut self, now: Instant, jitter: Duration) -> Instant {
        let start = match self.next_slot {
            Some(slot) if slot > now => slot,
            _ => now,
        };
        self.next_slot = Some(start + self.current + jitter);
        start
    }

    /// Feeds one response outcome into the control loop
    pub fn record_response(&mut self, healthy: bool, config: &PolitenessConfig) {
        if healthy {
            self.healthy_streak += 1;
            if self.healthy_streak >= config.recovery_after {
                self.healthy_streak = 0;
                let step = Duration::from_millis(config.recovery_step_ms);
                self.current = self.current.saturating_sub(step).max(self.baseline);
            }
        } else {
            self.healthy_streak = 0;
            let max = Duration::from_millis(config.max_delay_ms);
            let widened = Duration::try_from_secs_f64(
                self.current.as_secs_f64() * config.backoff_factor,
            )
            .unwrap_or(max);
            // A zero delay cannot grow multiplicatively
            let widened = if widened.is_zero() && config.backoff_factor > 1.0 {
                Duration::from_millis(config.min_delay_ms.max(1))
            } else {
                widened
            };
            self.current = clamp(widened, config);
        }
    }
}

fn clamp(delay: Duration, config: &PolitenessConfig) -> Duration {
    let min = Duration::from_millis(config.min_delay_ms);
    let max = Duration::from_millis(config.max_delay_ms);
    delay.clamp(min, max)
}

//! Run-wide stop signal

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

/// Why a run stopped before draining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Operator asked to stop (Ctrl-C or an explicit handle)
    Requested,
    /// `max-pages` pages have been fetched
    PageBudget,
    /// `max-duration-secs` has elapsed
    TimeBudget,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requested => "stop requested",
            Self::PageBudget => "page budget reached",
            Self::TimeBudget => "time budget reached",
        })
    }
}

/// Cloneable handle that stops a run; the first reason wins
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<Option<StopReason>>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Requests a stop; returns false if the run was already stopping
    pub fn stop(&self, reason: StopReason) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(reason);
                true
            } else {
                false
            }
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn reason(&self) -> Option<StopReason> {
        *self.tx.borrow()
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as self, so this only returns once stopped
        let _ = rx.wait_for(Option::is_some).await;
    }
}

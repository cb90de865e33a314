//! Run counters and the end-of-run summary
//!
//! Counters are shared between fetch workers and ingestion workers, so each is
//! a plain atomic. A [`CountSnapshot`] freezes them for reporting.

use crate::state::RunState;
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Live counters for one run
#[derive(Debug, Default)]
pub struct RunCounters {
    pages_fetched: AtomicU64,
    pages_failed: AtomicU64,
    urls_skipped: AtomicU64,
    documents_extracted: AtomicU64,
    processed: AtomicU64,
    indexed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// A page was fetched with a success status
    pub fn record_page_fetched(&self) {
        self.pages_fetched.fetch_add(1, Ordering::Relaxed);
    }

    /// A URL ended as failed after its fetch attempts
    pub fn record_page_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A URL was recorded as skipped without being fetched
    pub fn record_url_skipped(&self) {
        self.urls_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_document_extracted(&self) {
        self.documents_extracted.fetch_add(1, Ordering::Relaxed);
    }

    /// Pipeline: a document was embedded and upserted; returns the new indexed total
    pub fn record_indexed(&self) -> u64 {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.indexed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Pipeline: a document was too short to embed
    pub fn record_skipped(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Pipeline: embedding or upsert failed for a document
    pub fn record_failed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of pages fetched so far, used for the page budget
    pub fn pages_fetched(&self) -> u64 {
        self.pages_fetched.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CountSnapshot {
        CountSnapshot {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            urls_skipped: self.urls_skipped.load(Ordering::Relaxed),
            documents_extracted: self.documents_extracted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            indexed: self.indexed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`RunCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CountSnapshot {
    pub pages_fetched: u64,
    pub pages_failed: u64,
    pub urls_skipped: u64,
    pub documents_extracted: u64,

    /// Documents handed to the ingestion pipeline
    pub processed: u64,
    pub indexed: u64,
    /// Documents whose embedding text was too short
    pub skipped: u64,
    /// Documents whose embedding or upsert failed
    pub failed: u64,
}

impl CountSnapshot {
    /// Every processed document is exactly one of indexed, skipped or failed
    pub fn reconciles(&self) -> bool {
        self.processed == self.indexed + self.skipped + self.failed
    }
}

/// Final summary of a run
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub state: RunState,
    pub counts: CountSnapshot,
    pub elapsed: Duration,

    /// Point count of the collection after the run, when the store reported it
    pub collection_size: Option<u64>,

    /// Path of the JSON snapshot, when one was written
    pub snapshot_path: Option<PathBuf>,
}

/// Writes the run summary to `out`
pub fn write_summary<W: Write>(out: &mut W, summary: &RunSummary) -> io::Result<()> {
    let counts = &summary.counts;

    writeln!(out, "=== Run Summary ===\n")?;
    writeln!(out, "Final state: {}", summary.state)?;
    writeln!(out, "Duration: {:.1}s", summary.elapsed.as_secs_f64())?;
    writeln!(out)?;

    writeln!(out, "Crawl:")?;
    writeln!(out, "  Pages fetched: {}", counts.pages_fetched)?;
    writeln!(out, "  Pages failed: {}", counts.pages_failed)?;
    writeln!(out, "  URLs skipped: {}", counts.urls_skipped)?;
    writeln!(out, "  Documents extracted: {}", counts.documents_extracted)?;
    writeln!(out)?;

    writeln!(out, "Ingestion:")?;
    writeln!(out, "  Processed: {}", counts.processed)?;
    writeln!(out, "  Indexed: {}", counts.indexed)?;
    writeln!(out, "  Skipped: {}", counts.skipped)?;
    writeln!(out, "  Failed: {}", counts.failed)?;
    if let Some(size) = summary.collection_size {
        writeln!(out, "  Collection size: {} points", size)?;
    }
    writeln!(out)?;

    if let Some(path) = &summary.snapshot_path {
        writeln!(out, "Snapshot written to {}", path.display())?;
        writeln!(out)?;
    }

    let success_rate = if counts.processed > 0 {
        (counts.indexed as f64 / counts.processed as f64) * 100.0
    } else {
        0.0
    };

    writeln!(
        out,
        "Index Rate: {:.1}% ({} / {} documents indexed)",
        success_rate, counts.indexed, counts.processed
    )?;
    Ok(())
}

//! Output module for run reporting
//!
//! This module handles:
//! - Counting per-run outcomes shared by crawl and ingestion workers
//! - Printing the end-of-run summary
//! - Writing the optional JSON snapshot of extracted documents

mod snapshot;
pub mod stats;

pub use snapshot::SnapshotWriter;
pub use stats::{write_summary, CountSnapshot, RunCounters, RunSummary};

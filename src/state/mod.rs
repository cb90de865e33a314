//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlStatus` / `UrlRecord`: the status of each URL known to the frontier
//! - `HostThrottle`: per-host adaptive delay between requests
//! - `RunState`: the lifecycle of a whole run

mod host_state;
mod run_state;
mod url_state;

// Re-export main types
pub use host_state::HostThrottle;
pub use run_state::RunState;
pub use url_state::{SkipReason, UrlRecord, UrlStatus};

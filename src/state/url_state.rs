//! Per-URL status tracking for a single run
use std::fmt;

/// Why a URL was recorded as skipped rather than fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The link could not be parsed or normalized
    InvalidUrl,

    /// robots.txt disallows the path for our user agent
    RobotsDisallowed,

    /// The URL matched an exclusion pattern
    Excluded,
}

impl SkipReason {
    /// Stable reason code used in logs and reports
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl => "invalid-url",
            Self::RobotsDisallowed => "robots-disallowed",
            Self::Excluded => "excluded",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Represents the current status of a URL in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UrlStatus {
    /// Queued or being fetched
    Pending,

    /// Fetched successfully (whether or not it produced a document)
    Fetched,

    /// Fetch failed permanently or after exhausting retries
    Failed,

    /// Never fetched, for the given reason
    Skipped(SkipReason),
}

impl UrlStatus {
    /// Returns true if no further work will happen for the URL in this run
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Fetched => "fetched",
            Self::Failed => "failed",
            Self::Skipped(_) => "skipped",
        }
    }
}

impl fmt::Display for UrlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skipped(reason) => write!(f, "skipped ({})", reason),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A URL known to the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlRecord {
    /// Normalized URL
    pub url: String,

    /// Link distance from the nearest seed
    pub depth: u32,

    /// Lowercased host
    pub host: String,

    pub status: UrlStatus,
}

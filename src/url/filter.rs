use crate::config::Config;
use crate::url::domain::scope_host;
use crate::ConfigError;
use regex::{RegexSet, RegexSetBuilder};
use url::Url;

/// Compiled exclusion patterns
///
/// Every pattern is a case-insensitive regular expression tested against the
/// URL's path followed by its query (`/path?query`).
#[derive(Debug, Clone)]
pub struct ExclusionRules {
    set: RegexSet,
}

impl ExclusionRules {
    /// Compiles the given patterns into a single set
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let set = RegexSetBuilder::new(patterns.iter().map(|p| p.as_ref()))
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::InvalidPattern(e.to_string()))?;
        Ok(Self { set })
    }

    /// Rules that exclude nothing
    pub fn empty() -> Self {
        Self {
            set: RegexSet::empty(),
        }
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Returns true if the URL's path or query matches any exclusion pattern
pub fn is_excluded(url: &Url, rules: &ExclusionRules) -> bool {
    if rules.is_empty() {
        return false;
    }

    let target = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    rules.set.is_match(&target)
}

/// Returns true if the URL's host is one of the allowed hosts
///
/// Hosts are compared case-insensitively, ignoring a leading `www.` on either side.
pub fn is_in_scope<S: AsRef<str>>(url: &Url, allowed_hosts: &[S]) -> bool {
    let host = match url.host_str() {
        Some(host) => scope_host(host),
        None => return false,
    };

    allowed_hosts
        .iter()
        .any(|allowed| scope_host(allowed.as_ref()) == host)
}

/// What to do with a discovered URL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkVerdict {
    /// In scope and not excluded
    Crawl,
    /// In scope but matches an exclusion pattern
    Excluded,
    /// Host is not one of the allowed hosts
    OutOfScope,
    /// In scope but longer than the URL length limit
    TooLong,
}

/// Allowed hosts plus exclusion rules, checked before anything is enqueued
#[derive(Debug, Clone)]
pub struct CrawlScope {
    allowed_hosts: Vec<String>,
    rules: ExclusionRules,
    /// Longest URL accepted, in bytes (0 = unlimited)
    max_url_length: usize,
}

impl CrawlScope {
    pub fn new(allowed_hosts: Vec<String>, rules: ExclusionRules) -> Self {
        Self {
            allowed_hosts,
            rules,
            max_url_length: 0,
        }
    }

    /// Rejects URLs longer than `max` bytes; 0 disables the limit
    pub fn with_max_url_length(mut self, max: usize) -> Self {
        self.max_url_length = max;
        self
    }

    /// Builds the scope from the effective allowed hosts and exclusion patterns of a config
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let rules = ExclusionRules::new(config.crawler.exclude_patterns.as_slice())?;
        Ok(Self::new(config.effective_allowed_hosts(), rules)
            .with_max_url_length(config.crawler.max_url_length))
    }

    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    pub fn classify(&self, url: &Url) -> LinkVerdict {
        if !is_in_scope(url, self.allowed_hosts.as_slice()) {
            LinkVerdict::OutOfScope
        } else if self.max_url_length > 0 && url.as_str().len() > self.max_url_length {
            LinkVerdict::TooLong
        } else if is_excluded(url, &self.rules) {
            LinkVerdict::Excluded
        } else {
            LinkVerdict::Crawl
        }
    }
}

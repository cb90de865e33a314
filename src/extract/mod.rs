//! Content extraction module
//!
//! Turns a fetched HTML page into a [`Document`] (or nothing, for pages with
//! too little content) and the list of links it points at.

mod document;
mod html;

pub use document::{document_id, Document};
pub use html::{clean_text, CONTENT_SELECTORS};

use crate::url::{normalize_url, CrawlScope, LinkVerdict};
use chrono::{DateTime, Utc};
use scraper::Html;
use url::Url;

/// Pages whose cleaned main text is shorter than this (in characters) yield no document
pub const MIN_CONTENT_CHARS: usize = 100;

/// Number of internal links stored on a document
pub const STORED_LINKS: usize = 10;

/// Links found on a page, sorted by what the crawler should do with them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoveredLinks {
    /// In-scope, non-excluded URLs, normalized and deduplicated in document order
    pub candidates: Vec<Url>,

    /// In-scope URLs rejected by an exclusion pattern
    pub excluded: Vec<Url>,

    /// Hrefs that could not be turned into a crawlable URL
    pub invalid: Vec<String>,
}

/// Result of extracting one page
#[derive(Debug, Clone)]
pub struct Extraction {
    pub document: Option<Document>,
    pub links: DiscoveredLinks,
}

/// Extracts the document and links from an HTML page
///
/// # Arguments
///
/// * `body` - The HTML source
/// * `page_url` - The URL the page was served from, after redirects
/// * `scope` - Allowed hosts and exclusion rules applied to discovered links
/// * `fetched_at` - When the page was fetched
///
/// Links are returned even when the page yields no document.
pub fn extract(
    body: &str,
    page_url: &Url,
    scope: &CrawlScope,
    fetched_at: DateTime<Utc>,
) -> Extraction {
    let dom = Html::parse_document(body);
    let canonical = normalize_url(page_url.as_str(), None).unwrap_or_else(|_| page_url.clone());

    let links = discover_links(&dom, page_url, scope);

    let body_text = html::main_text(&dom);
    let length = body_text.chars().count();
    if length < MIN_CONTENT_CHARS {
        tracing::debug!(
            "No document for {}: main text has {} chars (minimum {})",
            canonical,
            length,
            MIN_CONTENT_CHARS
        );
        return Extraction {
            document: None,
            links,
        };
    }

    let url = canonical.to_string();
    let document = Document {
        id: document_id(&url),
        category: category_for(&url),
        title: html::title(&dom),
        meta_description: html::meta_description(&dom),
        word_count: body_text.split_whitespace().count(),
        body_text,
        headings: html::headings(&dom),
        internal_links: links
            .candidates
            .iter()
            .take(STORED_LINKS)
            .map(Url::to_string)
            .collect(),
        fetched_at,
        url,
    };

    Extraction {
        document: Some(document),
        links,
    }
}

fn discover_links(dom: &Html, page_url: &Url, scope: &CrawlScope) -> DiscoveredLinks {
    let mut links = DiscoveredLinks::default();
    let mut seen = std::collections::HashSet::new();

    for href in html::link_hrefs(dom) {
        let url = match normalize_url(&href, Some(page_url)) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Ignoring link '{}' on {}: {}", href, page_url, e);
                links.invalid.push(href);
                continue;
            }
        };

        if !seen.insert(url.to_string()) {
            continue;
        }

        match scope.classify(&url) {
            LinkVerdict::Crawl => links.candidates.push(url),
            LinkVerdict::Excluded => links.excluded.push(url),
            LinkVerdict::TooLong => {
                tracing::debug!("Ignoring over-long link on {}", page_url);
                links.invalid.push(url.to_string());
            }
            LinkVerdict::OutOfScope => {}
        }
    }

    links
}

/// Category of a page: the first path segment of its URL
///
/// Returns `homepage` for the root path and `unknown` when the URL cannot be parsed.
pub fn category_for(url: &str) -> String {
    let Ok(parsed) = Url::parse(url) else {
        return "unknown".to_string();
    };

    parsed
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| "homepage".to_string())
}

//! DOM queries over a parsed page

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;

/// Containers tried in order when looking for the main content of a page
pub const CONTENT_SELECTORS: &[&str] = &[
    "article",
    ".content",
    ".main-content",
    "#content",
    "main",
    ".entry-content",
    ".post-content",
];

/// Elements whose text is never part of the page content
const NON_CONTENT_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Prefixes of hrefs that never point at a crawlable page
const UNUSABLE_HREF_PREFIXES: &[&str] = &["javascript:", "mailto:", "tel:", "data:", "#"];

/// Collapses every run of whitespace to a single space and trims the ends
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns the cleaned visible text below an element
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();

    for node in element.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| NON_CONTENT_TAGS.contains(&el.name()))
        });

        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }

    clean_text(&raw)
}

/// Page title: `<title>`, else the first `<h1>`, else empty
pub fn title(document: &Html) -> String {
    first_text(document, "title")
        .or_else(|| first_text(document, "h1"))
        .unwrap_or_default()
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .map(element_text)
        .next()
        .filter(|text| !text.is_empty())
}

/// Content of `<meta name="description">`, else empty
pub fn meta_description(document: &Html) -> String {
    let Ok(selector) = Selector::parse("meta[name][content]") else {
        return String::new();
    };

    document
        .select(&selector)
        .find(|el| {
            el.value()
                .attr("name")
                .map_or(false, |name| name.trim().eq_ignore_ascii_case("description"))
        })
        .and_then(|el| el.value().attr("content"))
        .map(clean_text)
        .unwrap_or_default()
}

/// Main content text: the first content container with text, else the whole body
pub fn main_text(document: &Html) -> String {
    for candidate in CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(candidate) else {
            continue;
        };

        let matches: Vec<ElementRef<'_>> = document.select(&selector).collect();
        let ids: HashSet<_> = matches.iter().map(|el| el.id()).collect();

        // Nested matches are already covered by their outermost container
        let text = matches
            .iter()
            .filter(|el| !el.ancestors().any(|a| ids.contains(&a.id())))
            .map(|el| element_text(*el))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if !text.is_empty() {
            return text;
        }
    }

    match Selector::parse("body") {
        Ok(body) => match document.select(&body).next() {
            Some(el) => element_text(el),
            None => element_text(document.root_element()),
        },
        Err(_) => element_text(document.root_element()),
    }
}

/// Heading texts, h1 through h6, in document order
pub fn headings(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("h1, h2, h3, h4, h5, h6") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(element_text)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Raw href values of anchors worth resolving, deduplicated in document order
pub fn link_hrefs(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut hrefs = Vec::new();

    for element in document.select(&selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let href = href.trim();

        if href.is_empty() || is_unusable_href(href) {
            continue;
        }

        if seen.insert(href.to_string()) {
            hrefs.push(href.to_string());
        }
    }

    hrefs
}

fn is_unusable_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    UNUSABLE_HREF_PREFIXES
        .iter()
        .any(|prefix| lower.starts_with(prefix))
}

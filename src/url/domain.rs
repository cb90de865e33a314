use url::Url;

/// Extracts the host from a URL, lowercased
///
/// # Examples
///
/// ```
/// use url::Url;
/// use site_indexer::url::extract_host;
///
/// let url = Url::parse("https://EXAMPLE.com:8080/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Host key used for scope comparison: lowercased, without a leading `www.`
pub fn scope_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Origin key used for per-host state (robots.txt, throttling): scheme, host and port
pub fn origin_key(url: &Url) -> String {
    url.origin().ascii_serialization()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_subdomain() {
        let url = Url::parse("https://blog.example.com/post").unwrap();
        assert_eq!(extract_host(&url), Some("blog.example.com".to_string()));
    }

    #[test]
    fn test_extract_ignores_port() {
        let url = Url::parse("https://example.com:8080/").unwrap();
        assert_eq!(extract_host(&url), Some("example.com".to_string()));
    }

    #[test]
    fn test_scope_host_strips_www() {
        assert_eq!(scope_host("WWW.Example.org"), "example.org");
        assert_eq!(scope_host("example.org"), "example.org");
        assert_eq!(scope_host("wwwexample.org"), "wwwexample.org");
    }

    #[test]
    fn test_origin_key_includes_port() {
        let a = Url::parse("http://127.0.0.1:8081/a").unwrap();
        let b = Url::parse("http://127.0.0.1:8082/a").unwrap();
        assert_ne!(origin_key(&a), origin_key(&b));
        assert_eq!(origin_key(&a), "http://127.0.0.1:8081");
    }
}

//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and run the full
//! fetch, extract and index cycle end-to-end.

mod support;

use serde_json::json;
use site_indexer::config::Config;
use site_indexer::crawler::{HttpFetcher, RunController, RunReport, StopReason};
use site_indexer::extract::{document_id, Document};
use site_indexer::state::{RunState, SkipReason, UrlStatus};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use support::{article_page, stub_page, test_config, MemoryStore, StubEmbedder, DIMS};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body, "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(body))
        .mount(server)
        .await;
}

async fn never_fetched(server: &MockServer, route: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html(stub_page(&[])))
        .expect(0)
        .mount(server)
        .await;
}

async fn run_with(
    config: Config,
    embedder: Arc<StubEmbedder>,
    store: Arc<MemoryStore>,
) -> RunReport {
    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
    RunController::new(config, fetcher, embedder, store).run().await
}

/// Seed page with an article, two in-scope links, an external link and a login link
fn seed_page() -> String {
    article_page(
        "Welcome",
        100,
        "",
        &["/about/", "contact", "https://external.example/page", "/login"],
    )
}

#[tokio::test]
async fn test_seed_page_extracts_one_document_and_filters_links() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(&server, "/", seed_page()).await;
    mount_page(&server, "/about", stub_page(&[])).await;
    mount_page(&server, "/contact", stub_page(&[])).await;
    never_fetched(&server, "/login").await;

    let store = Arc::new(MemoryStore::default());
    let report = run_with(
        test_config(&format!("{}/", base)),
        Arc::new(StubEmbedder::default()),
        store.clone(),
    )
    .await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().documents_extracted, 1);
    assert_eq!(report.counts().indexed, 1);
    assert_eq!(store.point_count(), 1);

    let about = report
        .records
        .iter()
        .find(|r| r.url == format!("{}/about", base))
        .unwrap();
    assert_eq!(about.depth, 1);
    assert_eq!(about.status, UrlStatus::Fetched);
    assert_eq!(
        report.status_of(&format!("{}/contact", base)),
        Some(UrlStatus::Fetched)
    );
    assert_eq!(
        report.status_of(&format!("{}/login", base)),
        Some(UrlStatus::Skipped(SkipReason::Excluded))
    );
    assert!(report
        .records
        .iter()
        .all(|r| !r.url.contains("external.example")));
}

#[tokio::test]
async fn test_recrawl_overwrites_point() {
    let server = MockServer::start().await;
    let seed = format!("{}/", server.uri());
    let store = Arc::new(MemoryStore::default());

    mount_page(&server, "/", article_page("Home", 60, "first-edition", &[])).await;
    let report = run_with(test_config(&seed), Arc::new(StubEmbedder::default()), store.clone()).await;
    assert_eq!(report.counts().indexed, 1);

    server.reset().await;
    mount_page(&server, "/", article_page("Home", 60, "second-edition", &[])).await;
    let report = run_with(test_config(&seed), Arc::new(StubEmbedder::default()), store.clone()).await;
    assert_eq!(report.counts().indexed, 1);

    let id = document_id(&seed);
    assert_eq!(store.point_count(), 1);
    let full_text = store.payload_field(&id, "full_text").unwrap();
    assert!(full_text.as_str().unwrap().contains("second-edition"));
    assert!(!full_text.as_str().unwrap().contains("first-edition"));
}

#[tokio::test]
async fn test_embedding_failure_for_one_document_is_not_fatal() {
    let server = MockServer::start().await;

    mount_page(
        &server,
        "/",
        article_page("Index", 50, "", &["/a", "/b", "/c", "/d"]),
    )
    .await;
    for (route, marker) in [("/a", ""), ("/b", "FAILME"), ("/c", ""), ("/d", "")] {
        mount_page(&server, route, article_page(route, 50, marker, &[])).await;
    }

    let embedder = Arc::new(StubEmbedder::failing_on("FAILME"));
    let report = run_with(
        test_config(&format!("{}/", server.uri())),
        embedder.clone(),
        Arc::new(MemoryStore::default()),
    )
    .await;

    assert_eq!(report.state, RunState::Drained);
    let counts = report.counts();
    assert_eq!(counts.processed, 5);
    assert_eq!(counts.indexed, 4);
    assert_eq!(counts.failed, 1);
    assert!(counts.reconciles());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_max_depth_zero_fetches_only_seed() {
    let server = MockServer::start().await;

    mount_page(&server, "/", seed_page()).await;
    never_fetched(&server, "/about").await;
    never_fetched(&server, "/contact").await;

    let mut config = test_config(&format!("{}/", server.uri()));
    config.crawler.max_depth = 0;
    let report = run_with(config, Arc::new(StubEmbedder::default()), Arc::new(MemoryStore::default())).await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().pages_fetched, 1);
    assert_eq!(report.remaining, 0);
    assert!(report
        .records
        .iter()
        .all(|r| r.depth == 0 || matches!(r.status, UrlStatus::Skipped(_))));
}

#[tokio::test]
async fn test_robots_disallowed_url_is_never_fetched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/", article_page("Home", 40, "", &["/private/notes", "/public"])).await;
    mount_page(&server, "/public", stub_page(&[])).await;
    never_fetched(&server, "/private/notes").await;

    let report = run_with(
        test_config(&format!("{}/", server.uri())),
        Arc::new(StubEmbedder::default()),
        Arc::new(MemoryStore::default()),
    )
    .await;

    assert_eq!(
        report.status_of(&format!("{}/private/notes", server.uri())),
        Some(UrlStatus::Skipped(SkipReason::RobotsDisallowed))
    );
    assert_eq!(
        report.status_of(&format!("{}/public", server.uri())),
        Some(UrlStatus::Fetched)
    );
}

#[tokio::test]
async fn test_transient_errors_retried_then_failed() {
    let server = MockServer::start().await;

    mount_page(&server, "/", article_page("Home", 40, "", &["/flaky", "/gone"])).await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        // First attempt plus two retries
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let report = run_with(
        test_config(&format!("{}/", server.uri())),
        Arc::new(StubEmbedder::default()),
        Arc::new(MemoryStore::default()),
    )
    .await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().pages_failed, 2);
    assert_eq!(
        report.status_of(&format!("{}/flaky", server.uri())),
        Some(UrlStatus::Failed)
    );
    assert_eq!(
        report.status_of(&format!("{}/gone", server.uri())),
        Some(UrlStatus::Failed)
    );
}

#[tokio::test]
async fn test_shared_link_fetched_once() {
    let server = MockServer::start().await;

    mount_page(&server, "/", stub_page(&["/a", "/b", "/c"])).await;
    for route in ["/a", "/b", "/c"] {
        mount_page(&server, route, stub_page(&["/shared", "/shared/#top"])).await;
    }
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(html(stub_page(&[])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&format!("{}/", server.uri()));
    config.crawler.max_depth = 2;
    let report = run_with(config, Arc::new(StubEmbedder::default()), Arc::new(MemoryStore::default())).await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().pages_fetched, 5);
}

#[tokio::test]
async fn test_excluded_seed_is_skipped() {
    let server = MockServer::start().await;
    never_fetched(&server, "/wp-admin").await;

    let report = run_with(
        test_config(&format!("{}/wp-admin", server.uri())),
        Arc::new(StubEmbedder::default()),
        Arc::new(MemoryStore::default()),
    )
    .await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().urls_skipped, 1);
    assert_eq!(report.counts().pages_fetched, 0);
}

#[tokio::test]
async fn test_page_budget_cancels_run() {
    let server = MockServer::start().await;

    mount_page(&server, "/", stub_page(&["/a", "/b", "/c"])).await;
    for route in ["/a", "/b", "/c"] {
        mount_page(&server, route, stub_page(&[])).await;
    }

    let mut config = test_config(&format!("{}/", server.uri()));
    config.crawler.max_pages = 2;
    let report = run_with(config, Arc::new(StubEmbedder::default()), Arc::new(MemoryStore::default())).await;

    assert_eq!(report.state, RunState::Cancelled);
    assert_eq!(report.stop_reason, Some(StopReason::PageBudget));
    assert_eq!(report.counts().pages_fetched, 2);
}

#[tokio::test]
async fn test_stop_before_run_fetches_nothing() {
    let server = MockServer::start().await;
    never_fetched(&server, "/").await;

    let config = test_config(&format!("{}/", server.uri()));
    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
    let controller = RunController::new(
        config,
        fetcher,
        Arc::new(StubEmbedder::default()),
        Arc::new(MemoryStore::default()),
    );
    controller.stop_handle().stop(StopReason::Requested);

    let report = controller.run().await;
    assert_eq!(report.state, RunState::Cancelled);
    assert_eq!(report.stop_reason, Some(StopReason::Requested));
    assert_eq!(report.counts().pages_fetched, 0);
}

#[tokio::test]
async fn test_unreachable_embedder_fails_before_fetching() {
    let server = MockServer::start().await;
    never_fetched(&server, "/").await;

    let report = run_with(
        test_config(&format!("{}/", server.uri())),
        Arc::new(StubEmbedder::unavailable()),
        Arc::new(MemoryStore::default()),
    )
    .await;

    assert_eq!(report.state, RunState::Failed);
    assert!(!report.is_success());
    assert!(report.error.is_some());
}

#[tokio::test]
async fn test_snapshot_written_at_close() {
    let server = MockServer::start().await;
    let temp = TempDir::new().unwrap();

    mount_page(&server, "/", article_page("Home", 60, "", &[])).await;

    let mut config = test_config(&format!("{}/", server.uri()));
    config.output.snapshot_dir = Some(temp.path().to_string_lossy().into_owned());
    let report = run_with(config, Arc::new(StubEmbedder::default()), Arc::new(MemoryStore::default())).await;

    let path = report.summary.snapshot_path.clone().unwrap();
    assert!(path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .starts_with("snapshot_"));
    let saved: Vec<Document> =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].title, "Home");
}

#[tokio::test]
async fn test_end_to_end_with_http_capabilities() {
    let site = MockServer::start().await;
    let services = MockServer::start().await;

    mount_page(&site, "/", article_page("Home", 60, "", &["/next"])).await;
    mount_page(&site, "/next", article_page("Next", 60, "", &[])).await;

    // Embedding endpoint: the dimension lookup plus one call per document
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"index": 0, "embedding": vec![0.25f32; DIMS]}]
        })))
        .expect(3)
        .mount(&services)
        .await;

    // Collection is absent at open and reports two points at close
    Mock::given(method("GET"))
        .and(path("/collections/site_kb"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .mount(&services)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/site_kb"))
        .and(body_partial_json(json!({"vectors": {"size": DIMS, "distance": "Cosine"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
        .expect(1)
        .mount(&services)
        .await;
    Mock::given(method("PUT"))
        .and(path("/collections/site_kb/points"))
        .and(query_param("wait", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .expect(2)
        .mount(&services)
        .await;
    Mock::given(method("GET"))
        .and(path("/collections/site_kb"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "result": {
                "points_count": 2,
                "config": {"params": {"vectors": {"size": DIMS, "distance": "Cosine"}}}
            }
        })))
        .mount(&services)
        .await;

    let mut config = test_config(&format!("{}/", site.uri()));
    config.embedding.endpoint = format!("{}/v1", services.uri());
    config.vector_store.url = services.uri();

    let report = RunController::from_config(config).unwrap().run().await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().indexed, 2);
    assert_eq!(report.summary.collection_size, Some(2));
}

async fn mount_redirect(server: &MockServer, from: &str, to: &str) {
    Mock::given(method("GET"))
        .and(path(from))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}{}", server.uri(), to).as_str()),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_redirect_to_queued_page_fetches_it_once() {
    let server = MockServer::start().await;

    mount_page(&server, "/", article_page("Home", 100, "", &["/old", "/new"])).await;
    mount_redirect(&server, "/old", "/new").await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html(article_page("New", 100, "", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&format!("{}/", server.uri()));
    config.crawler.concurrency = 1;
    let store = Arc::new(MemoryStore::default());
    let report = run_with(config, Arc::new(StubEmbedder::default()), store.clone()).await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().documents_extracted, 2);
    assert_eq!(report.counts().processed, 2);
    assert_eq!(report.counts().indexed, 2);
    assert_eq!(store.point_count(), 2);
    assert_eq!(
        report.status_of(&format!("{}/new", server.uri())),
        Some(UrlStatus::Fetched)
    );
    assert_eq!(
        report.status_of(&format!("{}/old", server.uri())),
        Some(UrlStatus::Fetched)
    );
}

#[tokio::test]
async fn test_redirect_to_fetched_page_is_not_processed_again() {
    let server = MockServer::start().await;

    mount_page(&server, "/", article_page("Home", 100, "", &["/new", "/old"])).await;
    mount_redirect(&server, "/old", "/new").await;
    mount_page(&server, "/new", article_page("New", 100, "", &[])).await;

    let mut config = test_config(&format!("{}/", server.uri()));
    config.crawler.concurrency = 1;
    let store = Arc::new(MemoryStore::default());
    let report = run_with(config, Arc::new(StubEmbedder::default()), store.clone()).await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().documents_extracted, 2);
    assert_eq!(report.counts().processed, 2);
    assert_eq!(store.upserts.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_stop_during_retry_backoff_leaves_url_unfailed() {
    let server = MockServer::start().await;

    mount_page(&server, "/", article_page("Home", 40, "", &["/flaky"])).await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config(&format!("{}/", server.uri()));
    config.crawler.concurrency = 1;
    config.retry.max_retries = 5;
    config.retry.initial_backoff_ms = 30_000;
    config.retry.max_backoff_ms = 30_000;

    let fetcher = Arc::new(HttpFetcher::new(&config).unwrap());
    let controller = RunController::new(
        config,
        fetcher,
        Arc::new(StubEmbedder::default()),
        Arc::new(MemoryStore::default()),
    );
    let stop = controller.stop_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        stop.stop(StopReason::Requested);
    });

    let report = tokio::time::timeout(Duration::from_secs(10), controller.run())
        .await
        .expect("run should end promptly after stop");

    assert_eq!(report.state, RunState::Cancelled);
    assert_eq!(report.stop_reason, Some(StopReason::Requested));
    assert_eq!(report.counts().pages_failed, 0);
    assert_eq!(
        report.status_of(&format!("{}/flaky", server.uri())),
        Some(UrlStatus::Pending)
    );
}

#[tokio::test]
async fn test_non_finite_backoff_factor_fails_setup() {
    let server = MockServer::start().await;
    never_fetched(&server, "/").await;

    let mut config = test_config(&format!("{}/", server.uri()));
    config.politeness.backoff_factor = f64::INFINITY;
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        run_with(config, Arc::new(StubEmbedder::default()), Arc::new(MemoryStore::default())),
    )
    .await
    .expect("run should not hang");

    assert_eq!(report.state, RunState::Failed);
    assert!(report.error.unwrap().contains("backoff_factor"));
}

#[tokio::test]
async fn test_over_long_links_are_skipped() {
    let server = MockServer::start().await;

    let long = format!("/{}", "x".repeat(100));
    mount_page(&server, "/", stub_page(&["/short", long.as_str()])).await;
    mount_page(&server, "/short", stub_page(&[])).await;
    never_fetched(&server, &long).await;

    let mut config = test_config(&format!("{}/", server.uri()));
    config.crawler.max_url_length = 64;
    let report = run_with(config, Arc::new(StubEmbedder::default()), Arc::new(MemoryStore::default())).await;

    assert_eq!(report.state, RunState::Drained);
    assert_eq!(report.counts().pages_fetched, 2);
    assert_eq!(
        report.status_of(&format!("{}{}", server.uri(), long)),
        Some(UrlStatus::Skipped(SkipReason::InvalidUrl))
    );
}

//! Integration tests for the crawler
//!
//! These tests drive the full discover, render, extract cycle through an
//! in-memory renderer, so no browser is needed.

use async_trait::async_trait;
use docscrape::browser::{LinkSnapshot, Renderer};
use docscrape::config::Config;
use docscrape::{Coordinator, PageError, PageStatus, ScrapeError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

const ROOT: &str = "https://docs.example.com/guide";

/// How a fake page answers `render_html`
#[derive(Clone)]
enum FakePage {
    Html(String),
    AlwaysTimeout,
    /// Fails with a context error on the first attempt only
    RenderOnce(String),
    /// Fails with each error in turn, then serves a page
    Script(Vec<FakeError>),
    Panics,
}

#[derive(Clone, Copy)]
enum FakeError {
    Timeout,
    Render,
}

/// How the fake section root answers `collect_links`
#[derive(Clone)]
enum FakeLinks {
    Snapshot(Vec<&'static str>),
    QueryFails,
    NavigationFails,
}

/// Renderer serving canned pages, recording attempts and concurrency
struct FakeRenderer {
    links: FakeLinks,
    pages: HashMap<String, FakePage>,
    delay: Duration,
    attempts: Mutex<HashMap<String, usize>>,
    link_attempts: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeRenderer {
    fn new(links: FakeLinks) -> Self {
        Self {
            links,
            pages: HashMap::new(),
            delay: Duration::from_millis(5),
            attempts: Mutex::new(HashMap::new()),
            link_attempts: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn page(mut self, url: &str, page: FakePage) -> Self {
        self.pages.insert(url.to_string(), page);
        self
    }

    fn html(self, url: &str, body: &str) -> Self {
        let html = format!(
            "<html><head><title>{}</title></head><body><nav>Menu</nav><main>{}</main></body></html>",
            url, body
        );
        self.page(url, FakePage::Html(html))
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn attempts_for(&self, url: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(url)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn collect_links(&self, url: &Url) -> Result<LinkSnapshot, PageError> {
        self.link_attempts.fetch_add(1, Ordering::SeqCst);
        match &self.links {
            FakeLinks::Snapshot(hrefs) => Ok(LinkSnapshot {
                base_url: url.to_string(),
                hrefs: hrefs.iter().map(|h| h.to_string()).collect(),
            }),
            FakeLinks::QueryFails => Err(PageError::Query {
                url: url.to_string(),
                message: "Runtime.evaluate threw".to_string(),
            }),
            FakeLinks::NavigationFails => Err(PageError::Fetch {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            }),
        }
    }

    async fn render_html(&self, url: &Url) -> Result<String, PageError> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.pages.get(url.as_str()) {
            Some(FakePage::Html(html)) => Ok(html.clone()),
            Some(FakePage::AlwaysTimeout) => Err(PageError::Timeout {
                url: url.to_string(),
                timeout_ms: 45_000,
            }),
            Some(FakePage::RenderOnce(html)) if attempt > 1 => Ok(html.clone()),
            Some(FakePage::RenderOnce(_)) => Err(PageError::Render {
                url: url.to_string(),
                message: "Target closed".to_string(),
            }),
            Some(FakePage::Script(errors)) => match errors.get(attempt - 1) {
                Some(FakeError::Timeout) => Err(PageError::Timeout {
                    url: url.to_string(),
                    timeout_ms: 45_000,
                }),
                Some(FakeError::Render) => Err(PageError::Render {
                    url: url.to_string(),
                    message: "Target closed".to_string(),
                }),
                None => Ok("<main><p>Served after the script ran out</p></main>".to_string()),
            },
            Some(FakePage::Panics) => panic!("renderer blew up on {}", url),
            None => Err(PageError::Fetch {
                url: url.to_string(),
                message: "net::ERR_ABORTED 404".to_string(),
            }),
        }
    }
}

/// Creates a test configuration with fast retries
fn create_test_config(concurrency_limit: u32) -> Config {
    let mut config = Config::default();
    config.scraper.concurrency_limit = concurrency_limit;
    config.scraper.retry_budget = 2;
    config.scraper.retry_backoff_ms = 1;
    config
}

fn coordinator(renderer: &Arc<FakeRenderer>, concurrency_limit: u32) -> Coordinator {
    let renderer: Arc<dyn Renderer> = renderer.clone();
    Coordinator::new(create_test_config(concurrency_limit), renderer)
        .expect("Failed to create coordinator")
}

#[tokio::test]
async fn test_full_crawl_of_section() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec![
            "/guide/setup",
            "/blog/announcement",
            "/guide/usage#examples",
            "/guide/setup/",
            "https://other.example.com/guide/setup",
        ]))
        .html(
            "https://docs.example.com/guide/setup",
            "<h1>Setup</h1><p>Install the tool.</p><div><p>Install the tool.</p></div>",
        )
        .html(
            "https://docs.example.com/guide/usage",
            "<h1>Usage</h1><ul><li>Run it<ul><li>Quietly</li></ul></li></ul>",
        ),
    );

    let output = coordinator(&renderer, 4)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(output.section, ROOT);
    assert_eq!(output.pages_found, 2);

    let urls: Vec<&str> = output.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://docs.example.com/guide/setup",
            "https://docs.example.com/guide/usage"
        ]
    );

    assert_eq!(
        output
            .results
            .text("https://docs.example.com/guide/setup")
            .as_deref(),
        Some("# Setup\n\nInstall the tool.")
    );
    assert_eq!(
        output
            .results
            .text("https://docs.example.com/guide/usage")
            .as_deref(),
        Some("# Usage\n\n- Run it\n  - Quietly")
    );

    for record in output.results.iter() {
        assert_eq!(record.status, PageStatus::Extracted);
        assert_eq!(record.attempt_count, 1);
        assert!(record.finished_at.is_some());
    }
}

#[tokio::test]
async fn test_failing_page_exhausts_retry_budget() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec![
            "/guide/a",
            "/guide/slow",
            "/guide/c",
        ]))
        .html("https://docs.example.com/guide/a", "<p>Page A</p>")
        .page("https://docs.example.com/guide/slow", FakePage::AlwaysTimeout)
        .html("https://docs.example.com/guide/c", "<p>Page C</p>"),
    );

    let output = coordinator(&renderer, 2)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(output.pages_found, 3);
    assert_eq!(output.results.extracted().count(), 2);
    assert_eq!(output.results.failed().count(), 1);

    let slow = output
        .results
        .get("https://docs.example.com/guide/slow")
        .expect("Slow page missing from results");
    assert_eq!(slow.status, PageStatus::Failed);
    // One initial attempt plus the budget of two retries
    assert_eq!(slow.attempt_count, 3);
    assert_eq!(renderer.attempts_for("https://docs.example.com/guide/slow"), 3);
    assert!(matches!(slow.error, Some(PageError::Timeout { .. })));
    assert!(slow.content.is_empty());

    // The failure does not disturb result order
    let urls: Vec<&str> = output.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://docs.example.com/guide/a",
            "https://docs.example.com/guide/slow",
            "https://docs.example.com/guide/c"
        ]
    );
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let hrefs = vec![
        "/guide/p0", "/guide/p1", "/guide/p2", "/guide/p3", "/guide/p4", "/guide/p5",
        "/guide/p6", "/guide/p7", "/guide/p8", "/guide/p9",
    ];
    let mut renderer =
        FakeRenderer::new(FakeLinks::Snapshot(hrefs.clone())).delay(Duration::from_millis(20));
    for (i, href) in hrefs.iter().enumerate() {
        renderer = renderer.html(
            &format!("https://docs.example.com{}", href),
            &format!("<p>Content of page {}</p>", i),
        );
    }
    let renderer = Arc::new(renderer);

    let output = coordinator(&renderer, 3)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(output.pages_found, 10);
    assert_eq!(output.results.extracted().count(), 10);

    let max = renderer.max_in_flight.load(Ordering::SeqCst);
    assert!(max <= 3, "{} pages rendered at once", max);
    assert!(max >= 2, "pages were never rendered concurrently");
}

#[tokio::test]
async fn test_json_output_keyed_by_url_in_discovery_order() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec!["/guide/zeta", "/guide/alpha"]))
            .html("https://docs.example.com/guide/zeta", "<h2>Zeta</h2>")
            .html("https://docs.example.com/guide/alpha", "<h2>Alpha</h2>"),
    );

    let output = coordinator(&renderer, 2)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");
    let json = output.to_json(false).expect("Serialization failed");

    let zeta = json.find("guide/zeta").expect("zeta missing");
    let alpha = json.find("guide/alpha").expect("alpha missing");
    assert!(zeta < alpha);

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["section"], ROOT);
    assert_eq!(value["pages_found"], 2);
    let alpha = &value["results"]["https://docs.example.com/guide/alpha"];
    assert_eq!(alpha["status"], "extracted");
    assert_eq!(alpha["text"], "## Alpha");
    assert_eq!(alpha["title"], "https://docs.example.com/guide/alpha");
}

#[tokio::test]
async fn test_link_query_failure_falls_back_to_root() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::QueryFails).html(ROOT, "<p>Section overview</p>"),
    );

    let output = coordinator(&renderer, 2)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(output.pages_found, 1);
    assert_eq!(
        output.results.text(ROOT).as_deref(),
        Some("Section overview")
    );
    // Query failures are final, so discovery ran once
    assert_eq!(renderer.link_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_discovery_scrapes_root() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec!["/blog", "https://elsewhere.example.org/"]))
            .html(ROOT, "<p>Only page</p>"),
    );

    let output = coordinator(&renderer, 2)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    assert_eq!(output.pages_found, 1);
    assert_eq!(output.results.text(ROOT).as_deref(), Some("Only page"));
}

#[tokio::test]
async fn test_unreachable_root_is_fatal() {
    let renderer = Arc::new(FakeRenderer::new(FakeLinks::NavigationFails));

    let result = coordinator(&renderer, 2).scrape_section(ROOT).await;

    match result {
        Err(ScrapeError::Discovery { url, source }) => {
            assert_eq!(url, ROOT);
            assert!(matches!(source, PageError::Fetch { .. }));
        }
        other => panic!("Expected discovery failure, got {:?}", other.map(|o| o.pages_found)),
    }
    assert_eq!(renderer.link_attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_empty_page_is_not_retried() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec!["/guide/blank"]))
            .html("https://docs.example.com/guide/blank", "<div>   </div>"),
    );

    let output = coordinator(&renderer, 2)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    let blank = output
        .results
        .get("https://docs.example.com/guide/blank")
        .expect("Blank page missing from results");
    assert_eq!(blank.status, PageStatus::Failed);
    assert_eq!(blank.attempt_count, 1);
    assert!(matches!(blank.error, Some(PageError::EmptyContent { .. })));
}

#[tokio::test]
async fn test_render_error_retried_in_fresh_context() {
    let html = "<html><body><main><p>Recovered</p></main></body></html>".to_string();
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec!["/guide/flaky"]))
            .page("https://docs.example.com/guide/flaky", FakePage::RenderOnce(html)),
    );

    let output = coordinator(&renderer, 2)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    let flaky = output
        .results
        .get("https://docs.example.com/guide/flaky")
        .expect("Flaky page missing from results");
    assert_eq!(flaky.status, PageStatus::Extracted);
    assert_eq!(flaky.attempt_count, 2);
    assert_eq!(flaky.text(), "Recovered");
}

#[tokio::test]
async fn test_invalid_section_url_rejected() {
    let renderer = Arc::new(FakeRenderer::new(FakeLinks::Snapshot(vec![])));
    let coordinator = coordinator(&renderer, 2);

    assert!(matches!(
        coordinator.scrape_section("https://docs.example.com").await,
        Err(ScrapeError::Url(_))
    ));
    assert!(matches!(
        coordinator.scrape_section("ftp://docs.example.com/guide").await,
        Err(ScrapeError::Url(_))
    ));
    assert_eq!(renderer.link_attempts.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_single_page_extract() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec![]))
            .html("https://docs.example.com/guide/one", "<h3>One</h3><p>Body</p>"),
    );
    let coordinator = coordinator(&renderer, 1);

    let url = Url::parse("https://docs.example.com/guide/one").unwrap();
    let page = coordinator.extract(&url).await.expect("Extraction failed");
    assert_eq!(page.blocks, vec!["### One", "Body"]);
    assert_eq!(page.title.as_deref(), Some("https://docs.example.com/guide/one"));

    let missing = Url::parse("https://docs.example.com/guide/missing").unwrap();
    assert!(matches!(
        coordinator.extract(&missing).await,
        Err(PageError::Fetch { .. })
    ));
}

#[tokio::test]
async fn test_panicking_page_is_recorded_as_failed() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec![
            "/guide/a",
            "/guide/broken",
            "/guide/c",
        ]))
        .html("https://docs.example.com/guide/a", "<p>Page A</p>")
        .page("https://docs.example.com/guide/broken", FakePage::Panics)
        .html("https://docs.example.com/guide/c", "<p>Page C</p>"),
    );

    let output = coordinator(&renderer, 2)
        .scrape_section(ROOT)
        .await
        .expect("A panicking page must not abort the crawl");

    assert_eq!(output.pages_found, 3);
    assert_eq!(output.results.extracted().count(), 2);
    assert_eq!(
        output.results.text("https://docs.example.com/guide/c").as_deref(),
        Some("Page C")
    );

    let broken = output
        .results
        .get("https://docs.example.com/guide/broken")
        .expect("Broken page missing from results");
    assert_eq!(broken.status, PageStatus::Failed);
    assert_eq!(broken.attempt_count, 1);
    match &broken.error {
        Some(error @ PageError::Panicked { message, .. }) => {
            assert_eq!(error.kind(), "panicked");
            assert!(message.contains("renderer blew up"));
        }
        other => panic!("Expected a panic failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_mixed_errors_stay_within_retry_budget() {
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec!["/guide/unstable"])).page(
            "https://docs.example.com/guide/unstable",
            FakePage::Script(vec![
                FakeError::Timeout,
                FakeError::Render,
                FakeError::Timeout,
                FakeError::Timeout,
            ]),
        ),
    );

    let output = coordinator(&renderer, 1)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    let unstable = output
        .results
        .get("https://docs.example.com/guide/unstable")
        .expect("Unstable page missing from results");
    // Budget of two retries, shared by timeouts and the render retry
    assert_eq!(unstable.status, PageStatus::Failed);
    assert_eq!(unstable.attempt_count, 3);
    assert_eq!(renderer.attempts_for("https://docs.example.com/guide/unstable"), 3);
    assert!(matches!(unstable.error, Some(PageError::Timeout { .. })));
}

#[tokio::test]
async fn test_extracted_page_carries_metadata_and_links() {
    let html = r#"<html><head>
        <title>Handlers</title>
        <meta name="description" content="Writing request handlers.">
    </head><body><main>
        <p>Next: <a href="errors">error handling</a>.</p>
    </main></body></html>"#;
    let renderer = Arc::new(
        FakeRenderer::new(FakeLinks::Snapshot(vec!["/guide/handlers"])).page(
            "https://docs.example.com/guide/handlers",
            FakePage::Html(html.to_string()),
        ),
    );

    let output = coordinator(&renderer, 1)
        .scrape_section(ROOT)
        .await
        .expect("Crawl failed");

    let value: serde_json::Value =
        serde_json::from_str(&output.to_json(false).expect("Serialization failed")).unwrap();
    let page = &value["results"]["https://docs.example.com/guide/handlers"];
    assert_eq!(page["status"], "extracted");
    assert_eq!(page["description"], "Writing request handlers.");
    assert_eq!(page["metadata"]["description"], "Writing request handlers.");
    assert_eq!(page["links"][0], "https://docs.example.com/guide/errors");
}

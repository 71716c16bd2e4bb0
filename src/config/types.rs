use serde::{Deserialize, Serialize};

/// Main configuration structure for docscrape
///
/// Every section and field has a default, so an empty file (or no file at
/// all) yields a working configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub browser: BrowserConfig,
    pub extraction: ExtractionConfig,
}

/// Crawl scheduling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScraperConfig {
    /// Maximum number of pages rendering at the same time
    pub concurrency_limit: u32,

    /// Per-navigation timeout (milliseconds)
    pub navigation_timeout_ms: u64,

    /// How long to wait for a main-content selector before extracting anyway (milliseconds)
    pub content_wait_ms: u64,

    /// Extra attempts after a failed fetch
    pub retry_budget: u32,

    /// Backoff before the first retry; doubles for each later retry (milliseconds)
    pub retry_backoff_ms: u64,

    /// Abandon the whole crawl after this long (seconds)
    pub crawl_timeout_secs: Option<u64>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 20,
            navigation_timeout_ms: 45_000,
            content_wait_ms: 10_000,
            retry_budget: 2,
            retry_backoff_ms: 500,
            crawl_timeout_secs: None,
        }
    }
}

/// Browser engine and per-context settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// Run without a visible window
    pub headless: bool,

    /// Path to a Chrome/Chromium binary; auto-detected when unset
    pub executable: Option<String>,

    /// Pass --no-sandbox (needed when running as root in containers)
    pub no_sandbox: bool,

    /// User agent sent by every context
    pub user_agent: String,

    /// Viewport width in CSS pixels
    pub viewport_width: u32,

    /// Viewport height in CSS pixels
    pub viewport_height: u32,

    /// Locale reported to pages
    pub locale: String,

    /// Accept invalid or self-signed TLS certificates
    pub ignore_tls_errors: bool,

    /// Resource kinds never fetched by a context
    pub blocked_resources: Vec<ResourceKind>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            no_sandbox: false,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            viewport_width: 1280,
            viewport_height: 800,
            locale: "en-US".to_string(),
            ignore_tls_errors: true,
            blocked_resources: vec![
                ResourceKind::Image,
                ResourceKind::Stylesheet,
                ResourceKind::Font,
                ResourceKind::Media,
            ],
        }
    }
}

/// Network resource kinds a context may refuse to load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Image,
    Stylesheet,
    Font,
    Media,
    Script,
    TextTrack,
    Manifest,
    Other,
}

/// Content extraction settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Selectors tried in order to find the main content; `<body>` otherwise
    pub content_selectors: Vec<String>,

    /// Regions removed from the content root before it is walked
    pub boilerplate_selectors: Vec<String>,

    /// Lines shorter than this (after normalization) are formatting and are
    /// never removed as duplicates
    pub min_line_length: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            content_selectors: ["main", "article", "div.content", "div.documentation"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            boilerplate_selectors: [
                "nav",
                "aside",
                "footer",
                ".sidebar",
                "#sidebar",
                "[class*=sidebar]",
                "[id*=sidebar]",
                "[class*=navigation]",
                ".toc",
                ".menu",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_line_length: 4,
        }
    }
}

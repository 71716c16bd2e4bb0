//! docscrape: a documentation section crawler
//!
//! This crate discovers every page under a documentation section, renders each
//! page in a headless browser, and converts the rendered DOM into deduplicated,
//! structure-preserving text keyed by source URL.

pub mod browser;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for docscrape operations
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Failed to discover pages under {url}: {source}")]
    Discovery {
        url: String,
        #[source]
        source: PageError,
    },

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::PageStatus,
        to: state::PageStatus,
    },

    #[error("Crawl cancelled after {0:?}")]
    Cancelled(std::time::Duration),

    #[error("Worker task failed: {0}")]
    Task(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Per-page failures
///
/// These never abort a crawl; they are stored in the page's record and
/// reported in the aggregate result.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("Navigation to {url} failed: {message}")]
    Fetch { url: String, message: String },

    #[error("Timed out after {timeout_ms}ms loading {url}")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("No extractable content on {url}")]
    EmptyContent { url: String },

    #[error("Browser context failed on {url}: {message}")]
    Render { url: String, message: String },

    #[error("In-page query failed on {url}: {message}")]
    Query { url: String, message: String },

    #[error("Worker panicked while processing {url}: {message}")]
    Panicked { url: String, message: String },
}

impl PageError {
    /// Returns true if another attempt at the same page may succeed
    ///
    /// `Render` qualifies for a single retry only; see
    /// [`crawler::RetryState`].
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Timeout { .. } | Self::Render { .. }
        )
    }

    /// Short machine-readable kind, used in serialized results
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Timeout { .. } => "timeout",
            Self::EmptyContent { .. } => "empty_content",
            Self::Render { .. } => "render",
            Self::Query { .. } => "query",
            Self::Panicked { .. } => "panicked",
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("URL must include a section path (e.g. https://docs.example.com/section): {0}")]
    MissingSection(String),
}

/// Result type alias for docscrape operations
pub type Result<T> = std::result::Result<T, ScrapeError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for single-page operations
pub type PageResult<T> = std::result::Result<T, PageError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{scrape_section, Coordinator, ScrapeOutput};
pub use extract::{extract_page, ExtractedPage, ExtractionPolicy};
pub use state::{PageRecord, PageStatus};
pub use url::{canonicalize_url, SectionTarget};

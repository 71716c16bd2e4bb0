//! Crawler module for section discovery and page processing
//!
//! This module contains the core crawling logic, including:
//! - Link discovery under a section root
//! - Rendering and extraction of single pages
//! - Bounded-concurrency scheduling with retry and backoff
//! - Overall crawl coordination and result assembly

mod coordinator;
mod discover;
mod extractor;
mod retry;
mod scheduler;

pub use coordinator::Coordinator;
pub use discover::filter_links;
pub use extractor::PageExtractor;
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use scheduler::Scheduler;

use crate::browser::{Renderer, RenderingSession};
use crate::config::Config;
use crate::state::{PageRecord, PageStatus};
use crate::url::SectionTarget;
use crate::ScrapeError;
use chrono::{DateTime, Utc};
use serde::ser::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Aggregate result of a section crawl
#[derive(Debug, Clone, serde::Serialize)]
pub struct ScrapeOutput {
    /// Canonical section root
    pub section: String,

    /// Number of pages crawled (one result each)
    pub pages_found: usize,

    /// Results keyed by URL, in discovery order
    pub results: PageResults,
}

impl ScrapeOutput {
    /// Serializes the output as JSON
    pub fn to_json(&self, pretty: bool) -> Result<String, ScrapeError> {
        let json = if pretty {
            serde_json::to_string_pretty(self)?
        } else {
            serde_json::to_string(self)?
        };
        Ok(json)
    }
}

/// Page records in discovery order
///
/// Serializes as a JSON object keyed by URL, preserving that order.
#[derive(Debug, Clone, Default)]
pub struct PageResults(Vec<PageRecord>);

impl PageResults {
    pub fn new(records: Vec<PageRecord>) -> Self {
        Self(records)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageRecord> {
        self.0.iter()
    }

    /// Looks up the record for a URL
    pub fn get(&self, url: &str) -> Option<&PageRecord> {
        self.0.iter().find(|record| record.url.as_str() == url)
    }

    /// The extracted text for a URL, if it was extracted
    pub fn text(&self, url: &str) -> Option<String> {
        self.get(url)
            .filter(|record| record.status == PageStatus::Extracted)
            .map(PageRecord::text)
    }

    pub fn extracted(&self) -> impl Iterator<Item = &PageRecord> {
        self.0
            .iter()
            .filter(|record| record.status == PageStatus::Extracted)
    }

    pub fn failed(&self) -> impl Iterator<Item = &PageRecord> {
        self.0
            .iter()
            .filter(|record| record.status == PageStatus::Failed)
    }
}

/// Serialized form of one record
#[derive(serde::Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum PageOutcome<'a> {
    Extracted {
        title: Option<&'a str>,
        description: Option<&'a str>,
        metadata: &'a BTreeMap<String, String>,
        links: &'a [String],
        text: String,
        attempts: u32,
        finished_at: Option<DateTime<Utc>>,
    },
    Failed {
        error: String,
        error_kind: &'static str,
        attempts: u32,
        finished_at: Option<DateTime<Utc>>,
    },
}

impl<'a> From<&'a PageRecord> for PageOutcome<'a> {
    fn from(record: &'a PageRecord) -> Self {
        match &record.error {
            Some(error) => PageOutcome::Failed {
                error: error.to_string(),
                error_kind: error.kind(),
                attempts: record.attempt_count,
                finished_at: record.finished_at,
            },
            None => PageOutcome::Extracted {
                title: record.title.as_deref(),
                description: record.description.as_deref(),
                metadata: &record.metadata,
                links: &record.links,
                text: record.text(),
                attempts: record.attempt_count,
                finished_at: record.finished_at,
            },
        }
    }
}

impl Serialize for PageResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.0
                .iter()
                .map(|record| (record.url.as_str(), PageOutcome::from(record))),
        )
    }
}

/// Runs a complete section crawl in a fresh browser
///
/// This is the main entry point. It will:
/// 1. Validate the section URL
/// 2. Launch the browser
/// 3. Discover the pages under the section
/// 4. Extract every page under the concurrency limit
/// 5. Shut the browser down
///
/// # Arguments
///
/// * `config` - The scraper configuration
/// * `section_url` - e.g. `https://docs.example.com/guide`
///
/// # Returns
///
/// * `Ok(ScrapeOutput)` - One result per page; page failures are inside it
/// * `Err(ScrapeError)` - Invalid input, browser failure, discovery failure,
///   or the crawl timeout ran out (`Cancelled`)
pub async fn scrape_section(config: &Config, section_url: &str) -> Result<ScrapeOutput, ScrapeError> {
    let target = SectionTarget::parse(section_url)?;

    let session = Arc::new(RenderingSession::launch(config).await?);
    let renderer: Arc<dyn Renderer> = session.clone();
    let coordinator = Coordinator::new(config.clone(), renderer)?;

    let crawl = coordinator.scrape_target(&target);
    let result = match config.scraper.crawl_timeout_secs {
        Some(secs) => {
            let limit = Duration::from_secs(secs);
            match tokio::time::timeout(limit, crawl).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Crawl of {} cancelled after {:?}", target, limit);
                    Err(ScrapeError::Cancelled(limit))
                }
            }
        }
        None => crawl.await,
    };

    session.shutdown().await;
    result
}

//! Crawler coordinator - section crawl orchestration
//!
//! This module ties the pieces together:
//! - Parsing and scoping the section URL
//! - Discovering the pages under it
//! - Running the scheduler over every discovered page
//! - Packaging the ordered results

use super::discover::discover;
use super::extractor::PageExtractor;
use super::retry::RetryPolicy;
use super::scheduler::Scheduler;
use super::{PageResults, ScrapeOutput};
use crate::browser::Renderer;
use crate::config::Config;
use crate::extract::{ExtractedPage, ExtractionPolicy};
use crate::state::PageRecord;
use crate::url::SectionTarget;
use crate::{PageResult, ScrapeError};
use std::sync::Arc;
use url::Url;

/// Main crawler coordinator structure
///
/// Holds no per-crawl state, so one coordinator can run several crawls.
pub struct Coordinator {
    config: Arc<Config>,
    renderer: Arc<dyn Renderer>,
    extractor: Arc<PageExtractor>,
    retry: RetryPolicy,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `renderer` - The browser backend pages are rendered with
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ScrapeError)` - An extraction selector failed to compile
    pub fn new(config: Config, renderer: Arc<dyn Renderer>) -> Result<Self, ScrapeError> {
        let policy = ExtractionPolicy::from_config(&config.extraction)?;
        let extractor = Arc::new(PageExtractor::new(Arc::clone(&renderer), policy));
        let retry = RetryPolicy::from_config(&config.scraper);

        Ok(Self {
            config: Arc::new(config),
            renderer,
            extractor,
            retry,
        })
    }

    /// Discovers every in-section page linked from the section root
    pub async fn discover(&self, target: &SectionTarget) -> Result<Vec<Url>, ScrapeError> {
        discover(self.renderer.as_ref(), target, self.retry).await
    }

    /// Extracts every URL under the concurrency limit, in the given order
    pub async fn crawl(&self, urls: Vec<Url>) -> Result<Vec<PageRecord>, ScrapeError> {
        let scheduler = Scheduler::new(
            Arc::clone(&self.extractor),
            self.config.scraper.concurrency_limit as usize,
            self.retry,
        );
        scheduler.run(urls).await
    }

    /// Renders and extracts a single page, without retries
    pub async fn extract(&self, url: &Url) -> PageResult<ExtractedPage> {
        self.extractor.extract(url).await
    }

    /// Discovers and extracts every page under `section_url`
    ///
    /// # Errors
    ///
    /// * `ScrapeError::Url` - the section URL is invalid or has no section path
    /// * `ScrapeError::Discovery` - the section root could not be rendered
    pub async fn scrape_section(&self, section_url: &str) -> Result<ScrapeOutput, ScrapeError> {
        let target = SectionTarget::parse(section_url)?;
        self.scrape_target(&target).await
    }

    /// Discovers and extracts every page under an already-parsed section
    pub async fn scrape_target(&self, target: &SectionTarget) -> Result<ScrapeOutput, ScrapeError> {
        tracing::info!("Scraping section {} (prefix {})", target, target.prefix());

        let mut urls = self.discover(target).await?;
        if urls.is_empty() {
            tracing::info!("No in-section links found, scraping the section root only");
            urls.push(target.root().clone());
        }

        let records = self.crawl(urls).await?;
        let output = ScrapeOutput {
            section: target.root().to_string(),
            pages_found: records.len(),
            results: PageResults::new(records),
        };

        tracing::info!(
            "Section {} done: {} extracted, {} failed",
            target,
            output.results.extracted().count(),
            output.results.failed().count()
        );

        Ok(output)
    }
}

//! Bounded-concurrency crawl scheduler
//!
//! This module handles:
//! - One task per discovered page, started together
//! - Global concurrency limiting via a semaphore
//! - Per-page retry with exponential backoff
//! - Reassembling results in discovery order

use super::extractor::PageExtractor;
use super::retry::{RetryDecision, RetryPolicy, RetryState};
use crate::extract::ExtractedPage;
use crate::state::PageRecord;
use crate::{PageError, PageResult, ScrapeError};
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Runs page extractions with at most `concurrency_limit` pages rendering
pub struct Scheduler {
    /// Global semaphore for limiting concurrent renders
    semaphore: Arc<Semaphore>,

    extractor: Arc<PageExtractor>,

    retry: RetryPolicy,
}

impl Scheduler {
    /// Creates a new scheduler
    ///
    /// # Arguments
    ///
    /// * `extractor` - Renders and extracts one page
    /// * `concurrency_limit` - Maximum pages in `Rendering` at once
    /// * `retry` - Retry budget and backoff for failed pages
    pub fn new(extractor: Arc<PageExtractor>, concurrency_limit: usize, retry: RetryPolicy) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit.max(1))),
            extractor,
            retry,
        }
    }

    /// Processes every URL and returns one terminal record per URL
    ///
    /// Records come back in the order of `urls`, whatever order the pages
    /// finish in. Page failures are recorded, never returned as errors.
    /// Dropping the returned future aborts every in-flight page.
    ///
    /// # Errors
    ///
    /// * `ScrapeError::Task` - a page task was cancelled or the scheduler closed
    /// * `ScrapeError::InvalidTransition` - a record was driven through an illegal state change
    pub async fn run(&self, urls: Vec<Url>) -> Result<Vec<PageRecord>, ScrapeError> {
        let total = urls.len();
        let started = Instant::now();
        let mut tasks = JoinSet::new();

        for (index, url) in urls.into_iter().enumerate() {
            let semaphore = Arc::clone(&self.semaphore);
            let extractor = Arc::clone(&self.extractor);
            let retry = self.retry;

            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ScrapeError::Task(format!("Scheduler closed: {}", e)))?;
                let record = process_page(PageRecord::new(url), &extractor, retry).await?;
                Ok::<_, ScrapeError>((index, record))
            });
        }

        let mut slots: Vec<Option<PageRecord>> = (0..total).map(|_| None).collect();
        let mut completed = 0;
        let mut failed = 0;

        while let Some(joined) = tasks.join_next().await {
            let (index, record) = joined.map_err(|e| ScrapeError::Task(e.to_string()))??;

            completed += 1;
            if record.error.is_some() {
                failed += 1;
            }
            tracing::info!(
                "Progress: {}/{} pages ({} failed) - {} {}",
                completed,
                total,
                failed,
                record.status,
                record.url
            );

            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(record);
            }
        }

        tracing::info!(
            "Crawled {} pages in {:.1}s ({} failed)",
            total,
            started.elapsed().as_secs_f64(),
            failed
        );

        slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ScrapeError::Task("A page task finished without a result".to_string()))
    }
}

/// Drives one record from `Pending` to a terminal state
async fn process_page(
    mut record: PageRecord,
    extractor: &PageExtractor,
    policy: RetryPolicy,
) -> Result<PageRecord, ScrapeError> {
    let mut retry = RetryState::new(policy);

    loop {
        record.begin_attempt()?;
        tracing::debug!("Rendering {} (attempt {})", record.url, record.attempt_count);

        match attempt(extractor, &record.url).await {
            Ok(page) => {
                record.succeed(page)?;
                return Ok(record);
            }
            Err(error) => match retry.on_failure(&error) {
                RetryDecision::Retry { after } => {
                    tracing::warn!(
                        "Attempt {} for {} failed: {}; retrying in {:?}",
                        record.attempt_count,
                        record.url,
                        error,
                        after
                    );
                    tokio::time::sleep(after).await;
                }
                RetryDecision::GiveUp => {
                    tracing::warn!(
                        "Giving up on {} after {} attempt(s): {}",
                        record.url,
                        record.attempt_count,
                        error
                    );
                    record.fail(error)?;
                    return Ok(record);
                }
            },
        }
    }
}

/// Runs one extraction, turning a panic into a `PageError::Panicked`
async fn attempt(extractor: &PageExtractor, url: &Url) -> PageResult<ExtractedPage> {
    match AssertUnwindSafe(extractor.extract(url)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!("Extraction of {} panicked: {}", url, message);
            Err(PageError::Panicked {
                url: url.to_string(),
                message,
            })
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Page state definitions for tracking crawl progress
///
/// This module defines the states a page can be in during a crawl and the
/// record that carries its result.
use crate::extract::ExtractedPage;
use crate::{PageError, ScrapeError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use url::Url;

/// Represents the current state of a page in the crawl process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    // ===== Active States =====
    /// Page has been discovered and is waiting for a worker slot
    Pending,

    /// A worker holds a browser context for this page
    Rendering,

    // ===== Terminal States =====
    /// Page content was extracted
    Extracted,

    /// Every attempt failed; the record carries the last error
    Failed,
}

impl PageStatus {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Extracted | Self::Failed)
    }

    /// Returns true if `next` is a legal successor of this state
    ///
    /// `Rendering -> Rendering` is allowed: each retry attempt re-enters it.
    pub fn can_transition_to(&self, next: PageStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Rendering)
                | (Self::Rendering, Self::Rendering)
                | (Self::Rendering, Self::Extracted)
                | (Self::Rendering, Self::Failed)
        )
    }

    /// Lowercase name used in logs and serialized output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Rendering => "rendering",
            Self::Extracted => "extracted",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One discovered page and everything the crawl learned about it
#[derive(Debug, Clone)]
pub struct PageRecord {
    pub url: Url,
    pub status: PageStatus,
    pub attempt_count: u32,
    /// Ordered text blocks; empty unless `Extracted`
    pub content: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub metadata: BTreeMap<String, String>,
    /// Outbound links from the main content
    pub links: Vec<String>,
    /// Last error; set only when `Failed`
    pub error: Option<PageError>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PageRecord {
    /// Creates a pending record for a freshly discovered URL
    pub fn new(url: Url) -> Self {
        Self {
            url,
            status: PageStatus::Pending,
            attempt_count: 0,
            content: Vec::new(),
            title: None,
            description: None,
            metadata: BTreeMap::new(),
            links: Vec::new(),
            error: None,
            finished_at: None,
        }
    }

    /// Moves the record to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: PageStatus) -> Result<(), ScrapeError> {
        if !self.status.can_transition_to(next) {
            return Err(ScrapeError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Starts a new attempt: enters `Rendering` and bumps the attempt counter
    pub fn begin_attempt(&mut self) -> Result<(), ScrapeError> {
        self.transition(PageStatus::Rendering)?;
        self.attempt_count += 1;
        Ok(())
    }

    /// Stores extracted content and marks the record `Extracted`
    pub fn succeed(&mut self, page: ExtractedPage) -> Result<(), ScrapeError> {
        self.transition(PageStatus::Extracted)?;
        self.title = page.title;
        self.description = page.description;
        self.metadata = page.metadata;
        self.links = page.links;
        self.content = page.blocks;
        self.error = None;
        Ok(())
    }

    /// Stores the last error and marks the record `Failed`
    pub fn fail(&mut self, error: PageError) -> Result<(), ScrapeError> {
        self.transition(PageStatus::Failed)?;
        self.content.clear();
        self.links.clear();
        self.error = Some(error);
        Ok(())
    }

    /// The extracted blocks joined by blank lines
    pub fn text(&self) -> String {
        self.content.join("\n\n")
    }
}

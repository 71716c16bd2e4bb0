//! State module for tracking crawl progress
//!
//! This module provides the per-page record the scheduler mutates while a page
//! moves from discovery to a terminal result.
//!
//! # Components
//!
//! - `PageStatus`: Where a page is in the crawl (pending, rendering, extracted, failed)
//! - `PageRecord`: One discovered URL with its status, attempts and result

mod page_state;

// Re-export main types
pub use page_state::{PageRecord, PageStatus};

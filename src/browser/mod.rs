//! Browser rendering for docscrape
//!
//! The crawl engine reaches the browser only through the [`Renderer`] trait.
//! [`RenderingSession`] implements it on top of Chromium; tests substitute an
//! in-memory renderer.
//!
//! # Components
//!
//! - `Renderer`: Collect links from a page, or render a page to HTML
//! - `RenderingSession`: One Chromium process and a capped pool of browser contexts
//! - `ContextGuard`: A scoped browser context released on every exit path
//! - `ResourcePolicy`: Which resource kinds a context may load

mod policy;
mod session;

pub use policy::ResourcePolicy;
pub use session::{ContextGuard, RenderingSession};

use crate::PageResult;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

/// Anchor hrefs read from a rendered page in one query
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LinkSnapshot {
    /// The document's base URL (`document.baseURI`), used to resolve relative hrefs
    #[serde(rename = "base")]
    pub base_url: String,

    /// Raw `href` attribute values in document order
    pub hrefs: Vec<String>,
}

/// Page rendering backend
///
/// Every call uses a fresh, isolated browsing context.
///
/// Errors follow [`crate::PageError`]: navigation failures are `Fetch` or
/// `Timeout`, engine failures are `Render`, and a failed in-page query in
/// `collect_links` is `Query`.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Renders `url` and reads every anchor href in a single in-page query
    async fn collect_links(&self, url: &Url) -> PageResult<LinkSnapshot>;

    /// Renders `url`, waits briefly for main content, and returns the serialized DOM
    async fn render_html(&self, url: &Url) -> PageResult<String>;
}

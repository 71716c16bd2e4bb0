use crate::browser::Renderer;
use crate::extract::{extract_page_from, ExtractedPage, ExtractionPolicy};
use crate::{PageError, PageResult};
use std::sync::Arc;
use url::Url;

/// Renders one page and extracts its text
///
/// The parsed document lives only inside [`extract_page_from`], so it is never
/// held across an await point.
pub struct PageExtractor {
    renderer: Arc<dyn Renderer>,
    policy: ExtractionPolicy,
}

impl PageExtractor {
    pub fn new(renderer: Arc<dyn Renderer>, policy: ExtractionPolicy) -> Self {
        Self { renderer, policy }
    }

    /// Renders `url` and returns its deduplicated blocks
    ///
    /// # Errors
    ///
    /// * `PageError::Fetch` / `PageError::Timeout` - navigation failed
    /// * `PageError::Render` - the browser context failed
    /// * `PageError::EmptyContent` - the page rendered but had no text
    pub async fn extract(&self, url: &Url) -> PageResult<ExtractedPage> {
        let html = self.renderer.render_html(url).await?;
        let page = extract_page_from(&html, url, &self.policy);

        if page.is_empty() {
            return Err(PageError::EmptyContent {
                url: url.to_string(),
            });
        }

        tracing::debug!("Extracted {} blocks from {}", page.blocks.len(), url);
        Ok(page)
    }
}

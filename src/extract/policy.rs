use crate::config::{compile_selector, ExtractionConfig};
use crate::ConfigError;
use scraper::Selector;

/// Compiled extraction settings
///
/// Built once per crawl from [`ExtractionConfig`] and shared read-only by
/// every extraction.
#[derive(Debug, Clone)]
pub struct ExtractionPolicy {
    content: Vec<Selector>,
    boilerplate: Vec<Selector>,
    min_line_length: usize,
}

impl ExtractionPolicy {
    /// Compiles every configured selector
    ///
    /// # Errors
    ///
    /// * `ConfigError::InvalidSelector` - a selector does not parse
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        let content = config
            .content_selectors
            .iter()
            .map(|s| compile_selector(s))
            .collect::<Result<Vec<_>, _>>()?;
        let boilerplate = config
            .boilerplate_selectors
            .iter()
            .map(|s| compile_selector(s))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            content,
            boilerplate,
            min_line_length: config.min_line_length,
        })
    }

    /// Selectors tried in order to locate the main content
    pub fn content_selectors(&self) -> &[Selector] {
        &self.content
    }

    /// Selectors whose matches are removed before walking
    pub fn boilerplate_selectors(&self) -> &[Selector] {
        &self.boilerplate
    }

    /// Lines shorter than this are never removed by the line pass
    pub fn min_line_length(&self) -> usize {
        self.min_line_length
    }
}

use super::normalize::canonicalize;
use crate::UrlError;
use url::Url;

/// The section of a documentation site being crawled
///
/// Holds the canonical root URL and the path prefix every in-scope page must
/// share. Created once per crawl and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionTarget {
    root: Url,
    prefix: String,
}

impl SectionTarget {
    /// Parses a section URL such as `https://docs.example.com/guide`
    ///
    /// # Errors
    ///
    /// * `UrlError::Parse` / `UrlError::InvalidScheme` - not an HTTP(S) URL
    /// * `UrlError::MissingSection` - the URL has no path below the host
    pub fn parse(section_url: &str) -> Result<Self, UrlError> {
        let parsed = Url::parse(section_url.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
        Self::from_url(parsed)
    }

    /// Builds a section target from a parsed URL
    pub fn from_url(url: Url) -> Result<Self, UrlError> {
        let root = canonicalize(url)?;

        if root.path() == "/" {
            return Err(UrlError::MissingSection(root.to_string()));
        }

        let prefix = root.path().to_string();
        Ok(Self { root, prefix })
    }

    /// The canonical section root
    pub fn root(&self) -> &Url {
        &self.root
    }

    /// The path prefix shared by every in-scope page (no trailing slash)
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if `url` belongs to this section
    ///
    /// Scheme, host and port must match the root, and the path must equal the
    /// prefix or continue it with a `/` (so `/guide` never claims `/guides`).
    pub fn contains(&self, url: &Url) -> bool {
        if url.scheme() != self.root.scheme()
            || url.host_str() != self.root.host_str()
            || url.port_or_known_default() != self.root.port_or_known_default()
        {
            return false;
        }

        match url.path().strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// Resolves an href against the section root and canonicalizes it
    pub fn resolve(&self, href: &str) -> Option<Url> {
        self.resolve_from(&self.root, href)
    }

    /// Resolves an href against `base` (the document the href came from)
    ///
    /// Returns None for hrefs that never name a page:
    /// - empty or fragment-only hrefs
    /// - javascript:, mailto:, tel: and data: URIs
    /// - anything that does not resolve to an HTTP(S) URL
    pub fn resolve_from(&self, base: &Url, href: &str) -> Option<Url> {
        let href = href.trim();

        if href.is_empty() || href.starts_with('#') {
            return None;
        }

        let lowered = href.to_ascii_lowercase();
        if lowered.starts_with("javascript:")
            || lowered.starts_with("mailto:")
            || lowered.starts_with("tel:")
            || lowered.starts_with("data:")
        {
            return None;
        }

        let absolute = base.join(href).ok()?;
        canonicalize(absolute).ok()
    }
}

impl std::fmt::Display for SectionTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)
    }
}

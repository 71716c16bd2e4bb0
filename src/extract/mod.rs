//! Content extraction: rendered HTML to deduplicated text blocks
//!
//! Extraction is synchronous and browser-independent. The pipeline is:
//!
//! 1. Pick the main-content root (`main`, `article`, ... else `<body>`)
//! 2. Detach boilerplate regions below it
//! 3. Walk the tree in document order, emitting markdown-like fragments.
//!    Each element is consumed at most once and each normalized fragment is
//!    emitted at most once
//! 4. Drop repeated paragraphs, then repeated lines
//!
//! # Example
//!
//! ```
//! use docscrape::config::ExtractionConfig;
//! use docscrape::extract::{extract_page, ExtractionPolicy};
//!
//! let policy = ExtractionPolicy::from_config(&ExtractionConfig::default()).unwrap();
//! let page = extract_page("<main><h1>Intro</h1><p>Hello</p><p>hello</p></main>", &policy);
//! assert_eq!(page.blocks, vec!["# Intro", "Hello"]);
//! ```

mod boilerplate;
mod context;
mod dedup;
mod policy;
mod walker;

pub use context::{fingerprint, normalize, ExtractionContext, Fingerprint};
pub use policy::ExtractionPolicy;

use ego_tree::NodeId;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use url::Url;
use walker::Walker;

/// Result of extracting one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// `<meta name="description">` content
    pub description: Option<String>,

    /// Every `<meta>` with a `name` (or else `property`) and `content`
    pub metadata: BTreeMap<String, String>,

    /// Absolute http(s) links found in the main content, first-seen order
    pub links: Vec<String>,

    /// Ordered, deduplicated text blocks
    pub blocks: Vec<String>,
}

impl ExtractedPage {
    /// The blocks joined by blank lines
    pub fn text(&self) -> String {
        self.blocks.join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Extracts deduplicated, structure-preserving text from an HTML document
///
/// Deterministic: the same document and policy always give the same blocks.
/// Relative links cannot be resolved without the page URL and are left out;
/// use [`extract_page_from`] when the URL is known.
pub fn extract_page(html: &str, policy: &ExtractionPolicy) -> ExtractedPage {
    extract_with_base(html, None, policy)
}

/// Like [`extract_page`], resolving relative links against `page_url`
pub fn extract_page_from(html: &str, page_url: &Url, policy: &ExtractionPolicy) -> ExtractedPage {
    extract_with_base(html, Some(page_url), policy)
}

fn extract_with_base(html: &str, base: Option<&Url>, policy: &ExtractionPolicy) -> ExtractedPage {
    let mut document = Html::parse_document(html);
    let title = extract_title(&document);
    let metadata = extract_metadata(&document);
    let description = metadata.get("description").cloned();

    let root = boilerplate::content_root(&document, policy);
    let removed = boilerplate::strip(&mut document, root, policy);
    let links = extract_links(&document, root, base);

    let mut ctx = ExtractionContext::new();
    let fragments = match document.tree.get(root) {
        Some(node) => Walker::new(&mut ctx).walk(node),
        None => Vec::new(),
    };

    let text = dedup::dedup_paragraphs(&fragments.join("\n\n"));
    let text = dedup::dedup_lines(&text, policy.min_line_length());
    let blocks = dedup::split_blocks(&text);

    tracing::debug!(
        "Extracted {} blocks and {} links ({} fragments, {} nodes, {} boilerplate regions removed)",
        blocks.len(),
        links.len(),
        fragments.len(),
        ctx.processed_count(),
        removed
    );

    ExtractedPage {
        title,
        description,
        metadata,
        links,
        blocks,
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|s| !s.is_empty())
}

/// Collects `<meta>` name/property → content pairs; later tags win
fn extract_metadata(document: &Html) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    let Ok(meta_selector) = Selector::parse("meta[content]") else {
        return metadata;
    };

    for meta in document.select(&meta_selector) {
        let value = meta.value();
        let key = value
            .attr("name")
            .or_else(|| value.attr("property"))
            .map(str::trim)
            .filter(|key| !key.is_empty());
        let content = value.attr("content").map(str::trim).unwrap_or_default();

        if let Some(key) = key {
            if !content.is_empty() {
                metadata.insert(key.to_string(), content.to_string());
            }
        }
    }

    metadata
}

/// Absolute, de-fragmented http(s) links below the content root
fn extract_links(document: &Html, root: NodeId, base: Option<&Url>) -> Vec<String> {
    let Some(root_node) = document.tree.get(root) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for anchor in root_node
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|element| element.value().name() == "a")
    {
        let Some(href) = anchor.value().attr("href").map(str::trim) else {
            continue;
        };
        let resolved = match base {
            Some(base) => base.join(href),
            None => Url::parse(href),
        };
        let Ok(mut url) = resolved else {
            continue;
        };
        if url.scheme() != "http" && url.scheme() != "https" {
            continue;
        }
        url.set_fragment(None);

        let link = url.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

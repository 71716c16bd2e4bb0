//! Link discovery under a section root

use super::retry::{RetryDecision, RetryPolicy, RetryState};
use crate::browser::{LinkSnapshot, Renderer};
use crate::url::SectionTarget;
use crate::{PageError, ScrapeError};
use std::collections::HashSet;
use url::Url;

/// Returns every in-section page linked from the section root
///
/// Links are canonicalized, filtered to the section, de-duplicated and kept
/// in document order. If the root renders but the in-page link query fails,
/// the root alone is returned.
///
/// # Errors
///
/// * `ScrapeError::Discovery` - the root page could not be rendered
pub async fn discover(
    renderer: &dyn Renderer,
    target: &SectionTarget,
    policy: RetryPolicy,
) -> Result<Vec<Url>, ScrapeError> {
    let root = target.root();
    let mut retry = RetryState::new(policy);

    let snapshot = loop {
        match renderer.collect_links(root).await {
            Ok(snapshot) => break snapshot,
            Err(PageError::Query { message, .. }) => {
                tracing::warn!(
                    "Link query failed on {}: {}; crawling the section root only",
                    root,
                    message
                );
                return Ok(vec![root.clone()]);
            }
            Err(error) => match retry.on_failure(&error) {
                RetryDecision::Retry { after } => {
                    tracing::warn!("Discovery on {} failed: {}; retrying in {:?}", root, error, after);
                    tokio::time::sleep(after).await;
                }
                RetryDecision::GiveUp => {
                    return Err(ScrapeError::Discovery {
                        url: root.to_string(),
                        source: error,
                    });
                }
            },
        }
    };

    let links = filter_links(target, &snapshot);
    tracing::info!(
        "Found {} page(s) under {} ({} anchors)",
        links.len(),
        target,
        snapshot.hrefs.len()
    );
    Ok(links)
}

/// Resolves, scopes and de-duplicates the hrefs of a link snapshot
pub fn filter_links(target: &SectionTarget, snapshot: &LinkSnapshot) -> Vec<Url> {
    let base = Url::parse(&snapshot.base_url).unwrap_or_else(|_| target.root().clone());
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in &snapshot.hrefs {
        let Some(url) = target.resolve_from(&base, href) else {
            continue;
        };
        if !target.contains(&url) {
            tracing::trace!("Skipping out-of-section link {}", url);
            continue;
        }
        if seen.insert(url.clone()) {
            links.push(url);
        }
    }

    links
}

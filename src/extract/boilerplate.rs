//! Main-content selection and boilerplate removal

use super::policy::ExtractionPolicy;
use ego_tree::NodeId;
use scraper::{Html, Selector};

/// Picks the node the walk starts from
///
/// The first match of the first content selector that matches anything,
/// else `<body>`, else the document root.
pub fn content_root(document: &Html, policy: &ExtractionPolicy) -> NodeId {
    for selector in policy.content_selectors() {
        if let Some(element) = document.select(selector).next() {
            return element.id();
        }
    }

    if let Ok(body) = Selector::parse("body") {
        if let Some(element) = document.select(&body).next() {
            return element.id();
        }
    }

    document.tree.root().id()
}

/// Detaches every boilerplate region below `root`
///
/// The root itself is never removed, even if it matches a boilerplate
/// selector. Returns the number of regions detached.
pub fn strip(document: &mut Html, root: NodeId, policy: &ExtractionPolicy) -> usize {
    let targets: Vec<NodeId> = match document.tree.get(root) {
        Some(root_node) => root_node
            .descendants()
            .filter(|node| node.id() != root)
            .filter_map(scraper::ElementRef::wrap)
            .filter(|element| {
                policy
                    .boilerplate_selectors()
                    .iter()
                    .any(|selector| selector.matches(element))
            })
            .map(|element| element.id())
            .collect(),
        None => return 0,
    };

    // A region nested inside another one goes with its ancestor
    let outermost: Vec<NodeId> = targets
        .iter()
        .copied()
        .filter(|&id| {
            document
                .tree
                .get(id)
                .map(|node| !node.ancestors().any(|a| targets.contains(&a.id())))
                .unwrap_or(false)
        })
        .collect();

    for &id in &outermost {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    outermost.len()
}

use crate::config::ResourceKind;
use chromiumoxide::cdp::browser_protocol::fetch::{RequestPattern, RequestStage};
use chromiumoxide::cdp::browser_protocol::network::ResourceType;
use std::collections::HashSet;

/// Which network resource kinds a browsing context may load
///
/// Evaluated synchronously for every paused request; the decision is a set
/// lookup with no I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourcePolicy {
    blocked: HashSet<ResourceKind>,
}

impl ResourcePolicy {
    /// Builds a policy that blocks exactly the given kinds
    pub fn blocking<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = ResourceKind>,
    {
        Self {
            blocked: kinds.into_iter().collect(),
        }
    }

    /// A policy that loads everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn allows(&self, kind: ResourceKind) -> bool {
        !self.blocked.contains(&kind)
    }

    /// Decision for a request paused by the Fetch domain
    pub fn allows_request(&self, resource_type: &ResourceType) -> bool {
        match resource_kind(resource_type) {
            Some(kind) => self.allows(kind),
            None => true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.blocked.is_empty()
    }

    /// Fetch-domain patterns that pause only requests of blocked kinds
    ///
    /// Sorted so that the same policy always enables the same patterns.
    pub fn request_patterns(&self) -> Vec<RequestPattern> {
        let mut kinds: Vec<ResourceKind> = self.blocked.iter().copied().collect();
        kinds.sort_by_key(|kind| format!("{:?}", kind));

        kinds
            .into_iter()
            .map(|kind| RequestPattern {
                url_pattern: Some("*".to_string()),
                resource_type: Some(cdp_resource_type(kind)),
                request_stage: Some(RequestStage::Request),
            })
            .collect()
    }
}

fn cdp_resource_type(kind: ResourceKind) -> ResourceType {
    match kind {
        ResourceKind::Image => ResourceType::Image,
        ResourceKind::Stylesheet => ResourceType::Stylesheet,
        ResourceKind::Font => ResourceType::Font,
        ResourceKind::Media => ResourceType::Media,
        ResourceKind::Script => ResourceType::Script,
        ResourceKind::TextTrack => ResourceType::TextTrack,
        ResourceKind::Manifest => ResourceType::Manifest,
        ResourceKind::Other => ResourceType::Other,
    }
}

fn resource_kind(resource_type: &ResourceType) -> Option<ResourceKind> {
    match resource_type {
        ResourceType::Image => Some(ResourceKind::Image),
        ResourceType::Stylesheet => Some(ResourceKind::Stylesheet),
        ResourceType::Font => Some(ResourceKind::Font),
        ResourceType::Media => Some(ResourceKind::Media),
        ResourceType::Script => Some(ResourceKind::Script),
        ResourceType::TextTrack => Some(ResourceKind::TextTrack),
        ResourceType::Manifest => Some(ResourceKind::Manifest),
        ResourceType::Other => Some(ResourceKind::Other),
        // Documents, XHR, fetches and sockets are always allowed
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BrowserConfig;

    #[test]
    fn test_default_blocked_kinds() {
        let policy = ResourcePolicy::blocking(BrowserConfig::default().blocked_resources);
        assert!(!policy.allows(ResourceKind::Image));
        assert!(!policy.allows(ResourceKind::Stylesheet));
        assert!(!policy.allows(ResourceKind::Font));
        assert!(!policy.allows(ResourceKind::Media));
        assert!(policy.allows(ResourceKind::Script));
    }

    #[test]
    fn test_documents_always_allowed() {
        let policy = ResourcePolicy::blocking([ResourceKind::Image, ResourceKind::Other]);
        assert!(policy.allows_request(&ResourceType::Document));
        assert!(policy.allows_request(&ResourceType::Xhr));
        assert!(!policy.allows_request(&ResourceType::Image));
        assert!(!policy.allows_request(&ResourceType::Other));
    }

    #[test]
    fn test_request_patterns_cover_blocked_kinds() {
        let policy = ResourcePolicy::blocking([ResourceKind::Font, ResourceKind::Image]);
        let patterns = policy.request_patterns();
        assert_eq!(patterns.len(), 2);
        assert!(patterns
            .iter()
            .all(|p| p.request_stage == Some(RequestStage::Request)));
        assert_eq!(patterns[0].resource_type, Some(ResourceType::Font));
        assert_eq!(patterns[1].resource_type, Some(ResourceType::Image));
    }

    #[test]
    fn test_allow_all() {
        let policy = ResourcePolicy::allow_all();
        assert!(policy.is_empty());
        assert!(policy.request_patterns().is_empty());
        assert!(policy.allows(ResourceKind::Media));
    }
}

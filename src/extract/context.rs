use ego_tree::NodeId;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// SHA-256 of a fragment's normalized form
pub type Fingerprint = [u8; 32];

/// Per-page deduplication state
///
/// Holds the identities of DOM nodes already consumed and the fingerprints of
/// every fragment offered for output. A context lives for exactly one
/// extraction.
#[derive(Debug, Default)]
pub struct ExtractionContext {
    processed: HashSet<NodeId>,
    seen: HashSet<Fingerprint>,
}

impl ExtractionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a node as processed
    ///
    /// Returns false if it was already marked, in which case the caller must
    /// not produce content from it again.
    pub fn mark(&mut self, id: NodeId) -> bool {
        self.processed.insert(id)
    }

    /// Records a fragment's fingerprint and returns true if it was unseen
    pub fn admit(&mut self, fragment: &str) -> bool {
        self.seen.insert(fingerprint(fragment))
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }
}

/// Normalizes text for comparison: trimmed, lowercased, whitespace collapsed
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Fingerprints the normalized form of `text`
pub fn fingerprint(text: &str) -> Fingerprint {
    Sha256::digest(normalize(text).as_bytes()).into()
}

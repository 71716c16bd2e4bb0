//! URL handling for docscrape
//!
//! This module provides URL canonicalization and section scoping: deciding
//! which discovered links belong to the documentation section being crawled.

mod normalize;
mod section;

pub use normalize::{canonicalize, canonicalize_url};
pub use section::SectionTarget;

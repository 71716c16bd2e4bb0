//! Configuration module for docscrape
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every setting has a default, so the file is optional.
//!
//! # Example
//!
//! ```no_run
//! use docscrape::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docscrape.toml")).unwrap();
//! println!("Rendering up to {} pages at once", config.scraper.concurrency_limit);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{BrowserConfig, Config, ExtractionConfig, ResourceKind, ScraperConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub(crate) use validation::compile_selector;

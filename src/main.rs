//! docscrape main entry point
//!
//! This is the command-line interface for the docscrape section crawler.

use anyhow::Context;
use clap::Parser;
use docscrape::config::{load_config_with_hash, Config};
use docscrape::url::SectionTarget;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docscrape: a documentation section crawler
///
/// docscrape discovers every page under a documentation section, renders
/// each one in headless Chromium, and prints deduplicated text per page as
/// JSON.
#[derive(Parser, Debug)]
#[command(name = "docscrape")]
#[command(version = "1.0.0")]
#[command(about = "Crawl a documentation section into deduplicated text", long_about = None)]
struct Cli {
    /// Section URL, e.g. https://docs.example.com/guide
    #[arg(value_name = "SECTION_URL")]
    section_url: String,

    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and section URL and show the plan without launching a browser
    #[arg(long)]
    dry_run: bool,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    let config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            Config::default()
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &cli.section_url)?;
    } else {
        handle_scrape(&config, &cli.section_url, cli.pretty).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so stdout carries only the JSON result.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docscrape=info,warn"),
            1 => EnvFilter::new("docscrape=debug,info"),
            2 => EnvFilter::new("docscrape=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates inputs and shows what would be crawled
fn handle_dry_run(config: &Config, section_url: &str) -> anyhow::Result<()> {
    let target = SectionTarget::parse(section_url).context("Invalid section URL")?;

    println!("=== docscrape Dry Run ===\n");

    println!("Section:");
    println!("  Root: {}", target.root());
    println!("  Prefix: {}", target.prefix());

    println!("\nScraper:");
    println!("  Concurrency limit: {}", config.scraper.concurrency_limit);
    println!(
        "  Navigation timeout: {}ms",
        config.scraper.navigation_timeout_ms
    );
    println!("  Content wait: {}ms", config.scraper.content_wait_ms);
    println!(
        "  Retry budget: {} (backoff from {}ms)",
        config.scraper.retry_budget, config.scraper.retry_backoff_ms
    );
    match config.scraper.crawl_timeout_secs {
        Some(secs) => println!("  Crawl timeout: {}s", secs),
        None => println!("  Crawl timeout: none"),
    }

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    println!(
        "  Executable: {}",
        config.browser.executable.as_deref().unwrap_or("auto-detect")
    );
    println!(
        "  Viewport: {}x{}",
        config.browser.viewport_width, config.browser.viewport_height
    );
    println!("  Locale: {}", config.browser.locale);
    println!("  Ignore TLS errors: {}", config.browser.ignore_tls_errors);
    println!("  Blocked resources: {:?}", config.browser.blocked_resources);

    println!("\nExtraction:");
    println!(
        "  Content selectors: {}",
        config.extraction.content_selectors.join(", ")
    );
    println!(
        "  Boilerplate selectors ({}):",
        config.extraction.boilerplate_selectors.len()
    );
    for selector in &config.extraction.boilerplate_selectors {
        println!("    - {}", selector);
    }
    println!("  Min line length: {}", config.extraction.min_line_length);

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl pages under {}", target);

    Ok(())
}

/// Handles the main scrape operation and prints the JSON result
async fn handle_scrape(config: &Config, section_url: &str, pretty: bool) -> anyhow::Result<()> {
    let output = match docscrape::scrape_section(config, section_url).await {
        Ok(output) => output,
        Err(e) => {
            tracing::error!("Scrape failed: {}", e);
            return Err(e.into());
        }
    };

    tracing::info!(
        "Scraped {} page(s) from {}",
        output.pages_found,
        output.section
    );

    println!("{}", output.to_json(pretty)?);
    Ok(())
}

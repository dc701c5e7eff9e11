//! # docpull-core
//!
//! Core functionality for docpull - polite, hardened scraping of
//! documentation sites into a markdown file tree.
//!
//! Given a site's sitemap or crawlable link graph, docpull discovers
//! documentation pages, fetches them over HTTPS, extracts the main
//! content, converts it to markdown with frontmatter metadata, and
//! writes it to a deterministic layout keyed by URL path segments.
//!
//! ## Architecture
//!
//! The pipeline is discovery → filtering → fetch → validate → persist:
//!
//! - **Validation**: [`UrlValidator`] rejects unsafe URLs (non-HTTPS,
//!   private/reserved addresses) and re-checks every redirect hop.
//! - **Politeness**: [`RobotsGate`] enforces robots.txt, honors
//!   `Crawl-delay`, and surfaces sitemap hints. Compliance is not
//!   configurable.
//! - **Discovery**: [`discovery`] resolves sitemaps (recursively,
//!   size-bounded, XXE-safe) with a breadth-first link crawl as the
//!   fallback.
//! - **Fetching**: [`ContentFetcher`] over a [`fetcher::PageSource`]
//!   strategy (plain HTTP, or headless-browser rendering behind the
//!   `browser` feature) with exponential-backoff retry.
//! - **Persistence**: [`storage`] maps URLs onto a contained output
//!   tree; [`ContentHashCache`] tracks content changes across runs.
//! - **Orchestration**: [`FetchOrchestrator`] drives a run end to end,
//!   sequentially or with bounded concurrency, and reports
//!   [`FetchStats`].
//!
//! ## Quick Start
//!
//! ```no_run
//! use docpull_core::{FetchOrchestrator, FetcherConfig, SiteProfile};
//!
//! # async fn example() -> docpull_core::Result<()> {
//! let config = FetcherConfig::default();
//! let profile = SiteProfile::generic("https://docs.example.com/")?;
//! let orchestrator = FetchOrchestrator::new(config, profile)?;
//! let stats = orchestrator.run().await?;
//! println!("{stats}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! Failures are contained at the smallest unit: a page that fails
//! becomes an error-markdown file and a counter bump; a sitemap subtree
//! that fails contributes nothing. Only configuration-level errors
//! propagate out of a run.

/// Content-hash change detection across runs
pub mod cache;
/// Run configuration and per-site profiles
pub mod config;
/// HTML cleanup, main-content selection, and markdown assembly
pub mod content;
/// URL discovery: sitemaps, link crawling, filtering
pub mod discovery;
/// Error types and result alias
pub mod error;
/// HTTP fetching with retry and streaming limits
pub mod fetcher;
/// Rich page metadata extraction
pub mod metadata;
/// The end-to-end fetch pipeline
pub mod orchestrator;
#[cfg(feature = "browser")]
/// Headless-browser rendering strategy
pub mod render;
/// robots.txt compliance gate
pub mod robots;
/// Output tree layout and path safety
pub mod storage;
/// Core data types
pub mod types;
/// URL safety validation
pub mod validate;

// Re-export commonly used types
pub use cache::ContentHashCache;
pub use config::{FetcherConfig, SiteProfile, builtin_profile, builtin_profiles};
pub use error::{Error, Result};
pub use fetcher::{ContentFetcher, HttpSource};
pub use metadata::PageMetadata;
pub use orchestrator::FetchOrchestrator;
pub use robots::RobotsGate;
pub use types::{FetchStats, FetchTarget, RateLimit};
pub use validate::UrlValidator;

//! CLI structure and argument parsing.
//!
//! A single fetch-oriented interface: point `docpull` at a URL (or a
//! built-in profile name via `--profile`) and it scrapes that site's
//! documentation into a markdown tree. Flags override values from an
//! optional TOML config file, which in turn overrides defaults.

use clap::Parser;
use std::path::PathBuf;

/// Scrape documentation sites into a markdown file tree.
#[derive(Parser, Clone, Debug)]
#[command(name = "docpull")]
#[command(version)]
#[command(about = "docpull - polite documentation scraping to markdown", long_about = None)]
pub struct Cli {
    /// URL of the documentation site to fetch.
    #[arg(value_name = "URL", required_unless_present_any = ["profile", "list_profiles"])]
    pub url: Option<String>,

    /// Use a built-in site profile instead of a URL (see
    /// --list-profiles).
    #[arg(long, conflicts_with = "url")]
    pub profile: Option<String>,

    /// List built-in site profiles and exit.
    #[arg(long)]
    pub list_profiles: bool,

    /// Output directory for the markdown tree.
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// TOML config file; flags given on the command line win over it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Seconds to wait between requests.
    #[arg(long, value_name = "SECS")]
    pub rate_limit: Option<f64>,

    /// Maximum simultaneous in-flight fetches.
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Process URLs one at a time instead of concurrently.
    #[arg(long)]
    pub sequential: bool,

    /// Retries after the initial attempt for transient failures.
    #[arg(long, value_name = "N")]
    pub max_retries: Option<u32>,

    /// Stop after this many pages.
    #[arg(long, value_name = "N")]
    pub max_pages: Option<usize>,

    /// Link-crawl depth bound when no sitemap is found.
    #[arg(long, value_name = "N")]
    pub max_depth: Option<usize>,

    /// Substring pattern URLs must match (repeatable).
    #[arg(long = "include", value_name = "PATTERN")]
    pub include_patterns: Vec<String>,

    /// Substring pattern that disqualifies URLs (repeatable).
    #[arg(long = "exclude", value_name = "PATTERN")]
    pub exclude_patterns: Vec<String>,

    /// Re-fetch pages whose destination file already exists.
    #[arg(long)]
    pub no_skip_existing: bool,

    /// Render pages in a headless browser (requires the browser
    /// feature).
    #[arg(long)]
    pub js: bool,

    /// Custom User-Agent header.
    #[arg(long, value_name = "UA")]
    pub user_agent: Option<String>,

    /// Proxy URL for all outbound requests.
    #[arg(long, value_name = "URL")]
    pub proxy: Option<String>,

    /// Extract Open Graph / meta-tag metadata into the frontmatter.
    #[arg(long)]
    pub rich_metadata: bool,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

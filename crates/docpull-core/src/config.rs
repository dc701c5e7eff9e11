//! Run configuration and per-site profiles.
//!
//! Two kinds of settings feed a run:
//!
//! - [`FetcherConfig`] describes how to fetch: rate limit, concurrency,
//!   retries, output root, user agent. Loadable from a TOML file; every
//!   field has a default so a partial file works.
//! - [`SiteProfile`] describes what to fetch for one source: base
//!   URL, sitemap location, include/exclude patterns, and the inputs of
//!   the URL-to-path mapping. Profiles are plain data; the orchestrator
//!   is generic over them.
//!
//! A small built-in registry ships profiles for well-known documentation
//! sites, and [`SiteProfile::generic`] derives a usable profile from any
//! start URL.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// Default politeness delay between requests, in seconds.
pub const DEFAULT_RATE_LIMIT_SECS: f64 = 0.5;
/// Default bound on simultaneously in-flight fetches.
pub const DEFAULT_MAX_CONCURRENT: usize = 10;
/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default base delay for exponential backoff, in seconds.
pub const DEFAULT_RETRY_BASE_DELAY_SECS: f64 = 1.0;
/// Default crawl depth for the link-crawler fallback.
pub const DEFAULT_MAX_DEPTH: usize = 5;

fn default_user_agent() -> String {
    concat!("docpull/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_rate_limit() -> f64 {
    DEFAULT_RATE_LIMIT_SECS
}

fn default_max_concurrent() -> usize {
    DEFAULT_MAX_CONCURRENT
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_retry_base_delay() -> f64 {
    DEFAULT_RETRY_BASE_DELAY_SECS
}

fn default_skip_existing() -> bool {
    true
}

fn default_output_root() -> PathBuf {
    PathBuf::from("docs")
}

/// Settings governing a fetch run.
///
/// Immutable once the run starts, with one exception: the effective rate
/// limit starts at `rate_limit_secs` and may be raised (never lowered) by
/// [`crate::robots::RobotsGate`] when a site declares a larger
/// `Crawl-delay`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Root directory the output tree is written under. All output paths
    /// are validated to stay inside it.
    #[serde(default = "default_output_root")]
    pub output_root: PathBuf,

    /// Politeness delay between requests, in seconds.
    #[serde(default = "default_rate_limit")]
    pub rate_limit_secs: f64,

    /// Skip URLs whose destination file already exists.
    #[serde(default = "default_skip_existing")]
    pub skip_existing: bool,

    /// Optional exact-match host allowlist. When set, any URL whose host
    /// is not in the set is rejected.
    #[serde(default)]
    pub allowed_domains: Option<HashSet<String>>,

    /// Bound on simultaneously in-flight fetches in concurrent mode.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Retries after the initial attempt for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in seconds.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_secs: f64,

    /// Render pages in a headless browser instead of plain GET. Only
    /// honored when the `browser` feature is compiled in.
    #[serde(default)]
    pub use_js: bool,

    /// User-Agent header sent on every request, including robots.txt and
    /// sitemap fetches. Also the agent evaluated against robots rules.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Optional proxy URL applied uniformly to all outbound requests.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Extract Open Graph / meta-tag metadata into the frontmatter.
    #[serde(default)]
    pub rich_metadata: bool,

    /// Optional cap on the number of pages fetched, applied after
    /// filtering and sorting.
    #[serde(default)]
    pub max_pages: Option<usize>,

    /// Process URLs one at a time with a fixed sleep instead of the
    /// bounded-concurrent mode.
    #[serde(default)]
    pub sequential: bool,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            output_root: default_output_root(),
            rate_limit_secs: DEFAULT_RATE_LIMIT_SECS,
            skip_existing: true,
            allowed_domains: None,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_secs: DEFAULT_RETRY_BASE_DELAY_SECS,
            use_js: false,
            user_agent: default_user_agent(),
            proxy: None,
            rich_metadata: false,
            max_pages: None,
            sequential: false,
        }
    }
}

impl FetcherConfig {
    /// Load configuration from a TOML file.
    ///
    /// Missing fields take their defaults; an unreadable or malformed
    /// file is a configuration error that aborts the run.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config file {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Sanity-check values that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit_secs < 0.0 {
            return Err(Error::Config("rate_limit_secs must be >= 0".into()));
        }
        if self.retry_base_delay_secs < 0.0 {
            return Err(Error::Config("retry_base_delay_secs must be >= 0".into()));
        }
        if self.max_concurrent == 0 {
            return Err(Error::Config("max_concurrent must be >= 1".into()));
        }
        Ok(())
    }
}

/// Everything the orchestrator needs to know about one documentation
/// source.
///
/// Profiles are data, not code: a new site needs a new `SiteProfile`
/// value (or just [`SiteProfile::generic`]), never a new fetcher type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteProfile {
    /// Short name, also the default output subdirectory.
    pub name: String,

    /// Base URL stripped from page URLs when deriving output paths.
    /// Always ends with `/`.
    pub base_url: String,

    /// Sitemap to resolve. When absent, conventional locations are
    /// probed and the link crawler is the fallback.
    #[serde(default)]
    pub sitemap_url: Option<String>,

    /// Seed URLs for the link-crawler fallback. Defaults to `base_url`.
    #[serde(default)]
    pub start_urls: Vec<String>,

    /// Substring patterns a URL must match at least one of. Empty means
    /// everything under `base_url` is eligible.
    #[serde(default)]
    pub include_patterns: Vec<String>,

    /// Substring patterns that disqualify a URL.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,

    /// Leading path segment dropped before building the directory
    /// nesting (e.g. `docs`).
    #[serde(default)]
    pub strip_prefix: Option<String>,

    /// Subdirectory of the output root this source is written under.
    pub output_subdir: String,

    /// Depth bound for the link-crawler fallback.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

impl SiteProfile {
    /// Derive a profile from an arbitrary start URL.
    ///
    /// The base URL is the scheme+host root, the output subdirectory is
    /// the host with dots replaced by underscores, and the include
    /// patterns restrict discovery to the same site.
    pub fn generic(start_url: &str) -> Result<Self> {
        let parsed = Url::parse(start_url)
            .map_err(|e| Error::Config(format!("invalid start URL {start_url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| Error::Config(format!("start URL has no host: {start_url}")))?;
        let base_url = format!("{}://{host}/", parsed.scheme());
        Ok(Self {
            name: host.to_string(),
            output_subdir: host.replace('.', "_"),
            include_patterns: vec![base_url.clone()],
            exclude_patterns: Vec::new(),
            sitemap_url: None,
            start_urls: vec![start_url.to_string()],
            strip_prefix: None,
            max_depth: DEFAULT_MAX_DEPTH,
            base_url,
        })
    }

    /// Seed URLs for crawling, defaulting to the base URL.
    #[must_use]
    pub fn crawl_seeds(&self) -> Vec<String> {
        if self.start_urls.is_empty() {
            vec![self.base_url.clone()]
        } else {
            self.start_urls.clone()
        }
    }
}

/// Built-in profiles for well-known documentation sites.
///
/// These encode the same knowledge a hand-written site fetcher would:
/// where the sitemap lives and which sections are documentation rather
/// than marketing or blog content.
#[must_use]
pub fn builtin_profiles() -> Vec<SiteProfile> {
    vec![
        SiteProfile {
            name: "react".to_string(),
            base_url: "https://react.dev/".to_string(),
            sitemap_url: Some("https://react.dev/sitemap.xml".to_string()),
            start_urls: Vec::new(),
            include_patterns: vec!["/reference/".to_string(), "/learn/".to_string()],
            exclude_patterns: vec!["/blog/".to_string(), "/community/".to_string()],
            strip_prefix: None,
            output_subdir: "react".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        },
        SiteProfile {
            name: "nextjs".to_string(),
            base_url: "https://nextjs.org/".to_string(),
            sitemap_url: Some("https://nextjs.org/sitemap.xml".to_string()),
            start_urls: Vec::new(),
            include_patterns: vec!["/docs/".to_string()],
            exclude_patterns: vec!["/blog/".to_string(), "/showcase/".to_string()],
            strip_prefix: Some("docs".to_string()),
            output_subdir: "nextjs".to_string(),
            max_depth: DEFAULT_MAX_DEPTH,
        },
    ]
}

/// Look up a built-in profile by name (case-insensitive).
#[must_use]
pub fn builtin_profile(name: &str) -> Option<SiteProfile> {
    let lower = name.to_lowercase();
    builtin_profiles().into_iter().find(|p| p.name == lower)
}

//! robots.txt compliance gate.
//!
//! One [`RobotsGate`] serves a whole run. Per domain (scheme+host) it
//! fetches `/robots.txt` exactly once, caches the parsed rule set for the
//! process lifetime, and answers allow/deny queries for the configured
//! user agent. A failed or non-200 fetch is cached as "unrestricted" and
//! never retried within the run.
//!
//! Compliance is mandatory: there is no flag to bypass the gate.
//!
//! Two side channels ride along with the rules:
//!
//! - `Crawl-delay` larger than the current effective rate limit raises
//!   the run-wide [`RateLimit`] (monotonic, never lowered again).
//! - `Sitemap:` directives are surfaced for discovery bootstrapping.

use crate::types::RateLimit;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use texting_robots::Robot;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

/// Timeout for robots.txt fetches, deliberately shorter than page
/// fetches so a dead robots endpoint cannot stall discovery.
const ROBOTS_TIMEOUT: Duration = Duration::from_secs(10);

/// Cached per-domain robots.txt outcome.
///
/// `rules: None` means the domain is unrestricted, either because it
/// serves no robots.txt or because the fetch failed.
struct RobotsRecord {
    rules: Option<Robot>,
    sitemaps: Vec<String>,
}

/// Per-domain robots.txt cache answering allow/deny queries.
pub struct RobotsGate {
    client: Client,
    user_agent: String,
    rate_limit: RateLimit,
    // The lock spans miss-check and insert so each domain is fetched at
    // most once even when many tasks hit it concurrently.
    records: Mutex<HashMap<String, Arc<RobotsRecord>>>,
}

impl RobotsGate {
    /// Gate sharing the run's HTTP client and effective rate limit.
    #[must_use]
    pub fn new(client: Client, user_agent: String, rate_limit: RateLimit) -> Self {
        Self {
            client,
            user_agent,
            rate_limit,
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Whether robots.txt permits fetching `url` for the configured user
    /// agent. URLs whose domain cannot be determined are allowed; the URL
    /// validator is responsible for rejecting malformed input.
    pub async fn is_allowed(&self, url: &str) -> bool {
        let Some(record) = self.record_for(url).await else {
            return true;
        };
        match record.rules {
            Some(ref rules) => {
                let allowed = rules.allowed(url);
                if !allowed {
                    debug!(url, "blocked by robots.txt");
                }
                allowed
            },
            None => true,
        }
    }

    /// Sitemap URLs declared in the domain's robots.txt, if any.
    pub async fn sitemaps(&self, url: &str) -> Vec<String> {
        match self.record_for(url).await {
            Some(record) => record.sitemaps.clone(),
            None => Vec::new(),
        }
    }

    async fn record_for(&self, url: &str) -> Option<Arc<RobotsRecord>> {
        let domain = domain_key(url)?;

        let mut records = self.records.lock().await;
        if let Some(record) = records.get(&domain) {
            return Some(Arc::clone(record));
        }

        let record = Arc::new(self.fetch_record(&domain).await);
        records.insert(domain, Arc::clone(&record));
        Some(record)
    }

    async fn fetch_record(&self, domain: &str) -> RobotsRecord {
        let robots_url = format!("{domain}/robots.txt");
        debug!(url = %robots_url, "fetching robots.txt");

        let response = self
            .client
            .get(&robots_url)
            .timeout(ROBOTS_TIMEOUT)
            .send()
            .await;

        let body = match response {
            Ok(resp) if resp.status().is_success() => match resp.bytes().await {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(url = %robots_url, error = %e, "failed reading robots.txt body, treating as unrestricted");
                    return RobotsRecord {
                        rules: None,
                        sitemaps: Vec::new(),
                    };
                },
            },
            Ok(resp) => {
                debug!(url = %robots_url, status = %resp.status(), "no robots.txt, treating as unrestricted");
                return RobotsRecord {
                    rules: None,
                    sitemaps: Vec::new(),
                };
            },
            Err(e) => {
                debug!(url = %robots_url, error = %e, "robots.txt fetch failed, treating as unrestricted");
                return RobotsRecord {
                    rules: None,
                    sitemaps: Vec::new(),
                };
            },
        };

        match Robot::new(&self.user_agent, &body) {
            Ok(rules) => {
                if let Some(delay) = rules.delay {
                    if self.rate_limit.raise_to(f64::from(delay)) {
                        info!(
                            domain,
                            crawl_delay = delay,
                            "raising rate limit to honor Crawl-delay"
                        );
                    }
                }
                let sitemaps = rules.sitemaps.clone();
                if !sitemaps.is_empty() {
                    info!(domain, count = sitemaps.len(), "robots.txt declares sitemaps");
                }
                RobotsRecord {
                    rules: Some(rules),
                    sitemaps,
                }
            },
            Err(e) => {
                warn!(domain, error = %e, "unparseable robots.txt, treating as unrestricted");
                RobotsRecord {
                    rules: None,
                    sitemaps: Vec::new(),
                }
            },
        }
    }
}

/// Cache key for a URL's domain: `scheme://host[:port]`.
fn domain_key(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(match parsed.port() {
        Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
        None => format!("{}://{host}", parsed.scheme()),
    })
}

//! Probing of conventional sitemap locations.
//!
//! Sites without a profile-configured sitemap usually still have one at
//! a well-known path. A cheap HEAD request per candidate finds it
//! without downloading anything.

use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Candidate sitemap paths, tried in order.
const CANDIDATE_PATHS: &[&str] = &["sitemap.xml", "sitemap_index.xml", "docs/sitemap.xml"];

/// Timeout for each HEAD probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Probe conventional sitemap locations under `base_url`.
///
/// Returns the first candidate answering 200, or `None` when the site
/// exposes no sitemap at a conventional path.
pub async fn probe_sitemap(client: &Client, base_url: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    for candidate in CANDIDATE_PATHS {
        let Ok(sitemap_url) = base.join(candidate) else {
            continue;
        };
        debug!(url = %sitemap_url, "probing for sitemap");
        match client
            .head(sitemap_url.as_str())
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(url = %sitemap_url, "found sitemap");
                return Some(sitemap_url.to_string());
            },
            Ok(_) | Err(_) => {},
        }
    }
    None
}

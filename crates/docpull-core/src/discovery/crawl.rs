//! Breadth-first link crawling, the discovery fallback for sites with no
//! usable sitemap.
//!
//! The crawler walks the link graph from a set of seed URLs, bounded by
//! depth and by the profile's include/exclude patterns. Every node passes
//! the URL validator and the robots gate before its page is fetched;
//! per-page failures are logged at debug level and never abort the
//! crawl.
//!
//! Deduplication runs under a URL normalization (fragment stripped,
//! trailing slash trimmed, default ports dropped) so `.../guide`,
//! `.../guide/` and `.../guide#intro` count as one page.

use crate::robots::RobotsGate;
use crate::validate::UrlValidator;
use reqwest::Client;
use scraper::{Html, Selector};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Timeout for a single page fetch during crawling.
const CRAWL_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Breadth-first link crawler.
pub struct LinkCrawler<'a> {
    client: &'a Client,
    validator: &'a UrlValidator,
    robots: &'a RobotsGate,
    include_patterns: &'a [String],
    exclude_patterns: &'a [String],
}

impl<'a> LinkCrawler<'a> {
    /// Crawler borrowing the run's client, validator, and robots gate.
    #[must_use]
    pub fn new(
        client: &'a Client,
        validator: &'a UrlValidator,
        robots: &'a RobotsGate,
        include_patterns: &'a [String],
        exclude_patterns: &'a [String],
    ) -> Self {
        Self {
            client,
            validator,
            robots,
            include_patterns,
            exclude_patterns,
        }
    }

    /// Discover URLs reachable from `start_urls` within `max_depth`
    /// hops.
    ///
    /// A node at `max_depth` is still recorded, but its outbound links
    /// are not followed. The result is sorted for deterministic
    /// downstream processing.
    pub async fn crawl(&self, start_urls: &[String], max_depth: usize) -> Vec<String> {
        let mut discovered: BTreeSet<String> = BTreeSet::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(String, usize)> =
            start_urls.iter().map(|u| (u.clone(), 0)).collect();

        while let Some((url, depth)) = queue.pop_front() {
            let Some(key) = normalize_for_dedup(&url) else {
                continue;
            };
            if !visited.insert(key) {
                continue;
            }
            if !self.validator.validate(&url) {
                continue;
            }

            discovered.insert(url.clone());

            if depth >= max_depth {
                continue;
            }
            if !self.robots.is_allowed(&url).await {
                debug!(url, "crawl skipping robots-disallowed page");
                continue;
            }

            debug!(url, depth, "crawling");
            let html = match self.fetch_page(&url).await {
                Ok(html) => html,
                Err(e) => {
                    debug!(url, error = %e, "crawl fetch failed, continuing");
                    continue;
                },
            };

            let Ok(page_url) = Url::parse(&url) else {
                continue;
            };
            for link in extract_links(&html, &page_url) {
                if !self.matches_patterns(&link) {
                    continue;
                }
                if let Some(link_key) = normalize_for_dedup(&link) {
                    if !visited.contains(&link_key) {
                        queue.push_back((link, depth + 1));
                    }
                }
            }
        }

        info!(count = discovered.len(), "link crawl complete");
        discovered.into_iter().collect()
    }

    async fn fetch_page(&self, url: &str) -> crate::Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(CRAWL_FETCH_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    fn matches_patterns(&self, url: &str) -> bool {
        let included = self.include_patterns.is_empty()
            || self.include_patterns.iter().any(|p| url.contains(p.as_str()));
        let excluded = self
            .exclude_patterns
            .iter()
            .any(|p| url.contains(p.as_str()));
        included && !excluded
    }
}

/// Extract anchor targets from a page, resolved to absolute form against
/// the page URL with fragments stripped.
///
/// Synchronous on purpose: `scraper::Html` is not `Send`, so the parsed
/// document must not live across an await point.
fn extract_links(html: &str, page_url: &Url) -> Vec<String> {
    #[allow(clippy::expect_used)] // static selector, cannot fail
    let anchor = Selector::parse("a[href]").expect("valid selector");

    let document = Html::parse_document(html);
    let mut links = Vec::new();
    for element in document.select(&anchor) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Ok(mut absolute) = page_url.join(href) else {
            continue;
        };
        absolute.set_fragment(None);
        links.push(absolute.to_string());
    }
    links
}

/// Dedup key for a URL: fragment stripped, default port dropped,
/// trailing slash trimmed.
fn normalize_for_dedup(url: &str) -> Option<String> {
    let mut parsed = Url::parse(url).ok()?;
    parsed.set_fragment(None);
    let mut s = parsed.to_string();
    // The url crate already omits default ports; only the trailing slash
    // needs manual handling. Keep the bare origin form intact.
    if s.ends_with('/') && parsed.path() != "/" {
        s.pop();
    }
    Some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RateLimit;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn extracts_absolute_links_without_fragments() {
        let page_url = Url::parse("https://docs.example.com/guide/").unwrap();
        let html = r##"<html><body>
            <a href="/api/intro">api</a>
            <a href="advanced#section">relative</a>
            <a href="https://other.example.com/x">offsite</a>
            <a name="no-href">anchor</a>
        </body></html>"##;

        let links = extract_links(html, &page_url);
        assert_eq!(
            links,
            vec![
                "https://docs.example.com/api/intro".to_string(),
                "https://docs.example.com/guide/advanced".to_string(),
                "https://other.example.com/x".to_string(),
            ]
        );
    }

    #[test]
    fn dedup_normalization_merges_equivalent_urls() {
        let a = normalize_for_dedup("https://example.com/a/b/").unwrap();
        let b = normalize_for_dedup("https://example.com/a/b").unwrap();
        let c = normalize_for_dedup("https://example.com/a/b#frag").unwrap();
        let d = normalize_for_dedup("https://example.com:443/a/b").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(c, d);

        // The site root keeps its slash.
        let root = normalize_for_dedup("https://example.com/").unwrap();
        assert!(root.ends_with('/'));
    }

    fn page(links: &[&str]) -> String {
        let body: String = links
            .iter()
            .map(|l| format!("<a href=\"{l}\">x</a>"))
            .collect();
        format!("<html><body>{body}</body></html>")
    }

    #[tokio::test]
    async fn crawl_respects_depth_and_patterns() {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/start"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&[
                "/docs/a",
                "/blog/ignored",
                "/docs/b",
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["/docs/deep"])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/b"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&[])))
            .mount(&server)
            .await;

        let client = Client::new();
        let validator = UrlValidator::new().danger_allow_insecure();
        let robots = RobotsGate::new(client.clone(), "docpull/test".into(), RateLimit::from_secs(0.0));
        let include = vec!["/docs/".to_string()];
        let exclude = vec!["/blog/".to_string()];
        let crawler = LinkCrawler::new(&client, &validator, &robots, &include, &exclude);

        let urls = crawler
            .crawl(&[format!("{base}/docs/start")], 1)
            .await;

        // Depth 1: start page expanded, its children recorded but /docs/deep
        // (depth 2) never reached; /blog/ excluded by pattern.
        assert!(urls.contains(&format!("{base}/docs/start")));
        assert!(urls.contains(&format!("{base}/docs/a")));
        assert!(urls.contains(&format!("{base}/docs/b")));
        assert!(!urls.iter().any(|u| u.contains("/docs/deep")));
        assert!(!urls.iter().any(|u| u.contains("/blog/")));
    }

    #[tokio::test]
    async fn crawl_survives_fetch_errors() {
        let server = MockServer::start().await;
        let base = server.uri();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/start"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(page(&["/docs/broken", "/docs/fine"])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/fine"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&[])))
            .mount(&server)
            .await;

        let client = Client::new();
        let validator = UrlValidator::new().danger_allow_insecure();
        let robots = RobotsGate::new(client.clone(), "docpull/test".into(), RateLimit::from_secs(0.0));
        let include = vec![];
        let exclude = vec![];
        let crawler = LinkCrawler::new(&client, &validator, &robots, &include, &exclude);

        let urls = crawler
            .crawl(&[format!("{base}/docs/start")], 2)
            .await;

        // The broken page is still recorded as discovered even though its
        // fetch failed; the crawl itself keeps going.
        assert!(urls.contains(&format!("{base}/docs/broken")));
        assert!(urls.contains(&format!("{base}/docs/fine")));
    }
}

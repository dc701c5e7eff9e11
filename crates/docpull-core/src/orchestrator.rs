//! The fetch pipeline: discover, filter, map, fetch, persist.
//!
//! One [`FetchOrchestrator`] drives a full run for one documentation
//! source. Failures are contained at the smallest unit: a failed page
//! becomes a counter bump (and, for non-policy failures, a visible
//! error-markdown file), a failed sitemap subtree contributes nothing,
//! and the run always completes with a tally. Only configuration-level
//! errors propagate.
//!
//! Runs are not atomic. Partial output after an interrupted run is
//! expected; re-running with `skip_existing` picks up where it left off.

use crate::cache::ContentHashCache;
use crate::config::{FetcherConfig, SiteProfile};
use crate::content;
use crate::discovery::{LinkCrawler, SitemapResolver, filter_urls, probe_sitemap};
use crate::fetcher::{ContentFetcher, HttpSource, PageSource, build_client};
use crate::robots::RobotsGate;
use crate::storage;
use crate::types::{FetchStats, FetchTarget, RateLimit};
use crate::validate::UrlValidator;
use crate::{Error, Result};
use futures::future::join_all;
use reqwest::Client;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Per-URL outcome, folded into [`FetchStats`] at the gather point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Fetched,
    Skipped,
    Errored,
}

/// Drives a full fetch run for one site profile.
pub struct FetchOrchestrator {
    config: FetcherConfig,
    profile: SiteProfile,
    client: Client,
    validator: Arc<UrlValidator>,
    robots: Arc<RobotsGate>,
    cache: ContentHashCache,
    rate_limit: RateLimit,
}

impl FetchOrchestrator {
    /// Orchestrator with the standard strict validator.
    pub fn new(config: FetcherConfig, profile: SiteProfile) -> Result<Self> {
        let validator = UrlValidator::with_allowed_domains(config.allowed_domains.clone());
        Self::with_validator(config, profile, validator)
    }

    /// Orchestrator with an explicit validator (tests inject a
    /// permissive one to talk to local mock servers).
    pub fn with_validator(
        config: FetcherConfig,
        profile: SiteProfile,
        validator: UrlValidator,
    ) -> Result<Self> {
        config.validate()?;
        let validator = Arc::new(validator);
        let client = build_client(
            Arc::clone(&validator),
            &config.user_agent,
            config.proxy.as_deref(),
        )?;
        let rate_limit = RateLimit::from_secs(config.rate_limit_secs);
        let robots = Arc::new(RobotsGate::new(
            client.clone(),
            config.user_agent.clone(),
            rate_limit.clone(),
        ));
        let cache = ContentHashCache::load(&config.output_root);
        Ok(Self {
            config,
            profile,
            client,
            validator,
            robots,
            cache,
            rate_limit,
        })
    }

    /// Run the pipeline to completion and report the tally.
    pub async fn run(&self) -> Result<FetchStats> {
        info!(profile = %self.profile.name, "starting fetch run");

        let urls = self.discover().await;
        if urls.is_empty() {
            warn!(profile = %self.profile.name, "no URLs discovered, nothing to do");
            return Ok(FetchStats::default());
        }

        let urls = filter_urls(
            urls,
            &self.profile.include_patterns,
            &self.profile.exclude_patterns,
        );

        // Sorted + deduplicated for deterministic processing order.
        let mut urls: Vec<String> = urls.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if let Some(max_pages) = self.config.max_pages {
            if urls.len() > max_pages {
                info!(max_pages, "truncating URL list");
                urls.truncate(max_pages);
            }
        }

        let targets: Vec<FetchTarget> = urls
            .into_iter()
            .map(|url| {
                let output_path = storage::output_path(&self.config.output_root, &self.profile, &url);
                FetchTarget { url, output_path }
            })
            .collect();
        info!(count = targets.len(), "processing targets");

        let (fetcher, browser) = self.build_fetcher().await?;
        let stats = if self.config.sequential {
            self.run_sequential(&fetcher, &targets).await
        } else {
            self.run_concurrent(&fetcher, &targets).await
        };

        // The browser is torn down exactly once, whatever happened above.
        #[cfg(feature = "browser")]
        if let Some(browser) = browser {
            if let Err(e) = browser.close().await {
                warn!(error = %e, "browser teardown failed");
            }
        }
        #[cfg(not(feature = "browser"))]
        let _ = browser;

        if let Err(e) = self.cache.save() {
            warn!(error = %e, "could not save content hash cache");
        }

        info!(profile = %self.profile.name, %stats, "fetch run complete");
        Ok(stats)
    }

    /// Pick the page source for this run and wrap it in a fetcher.
    ///
    /// Returns the browser handle separately so teardown stays with the
    /// orchestrator.
    #[cfg(feature = "browser")]
    async fn build_fetcher(
        &self,
    ) -> Result<(ContentFetcher, Option<Arc<crate::render::BrowserSource>>)> {
        if self.config.use_js {
            let browser = Arc::new(crate::render::BrowserSource::launch(&self.config.user_agent).await?);
            let source: Arc<dyn PageSource> = Arc::clone(&browser) as Arc<dyn PageSource>;
            Ok((
                ContentFetcher::new(source, self.config.rich_metadata),
                Some(browser),
            ))
        } else {
            Ok((self.http_fetcher(), None))
        }
    }

    #[cfg(not(feature = "browser"))]
    async fn build_fetcher(&self) -> Result<(ContentFetcher, Option<()>)> {
        if self.config.use_js {
            warn!("JavaScript rendering requested but the browser feature is not compiled in, using plain HTTP");
        }
        Ok((self.http_fetcher(), None))
    }

    fn http_fetcher(&self) -> ContentFetcher {
        let source: Arc<dyn PageSource> = Arc::new(HttpSource::new(
            self.client.clone(),
            self.config.max_retries,
            self.config.retry_base_delay_secs,
        ));
        ContentFetcher::new(source, self.config.rich_metadata)
    }

    /// Resolve the candidate URL set: configured sitemap, robots.txt
    /// sitemap hints, probed conventional locations, then link crawl.
    async fn discover(&self) -> Vec<String> {
        let resolver = SitemapResolver::new(self.client.clone(), Arc::clone(&self.validator));

        if let Some(ref sitemap_url) = self.profile.sitemap_url {
            let urls = resolver.resolve(sitemap_url).await;
            if !urls.is_empty() {
                info!(count = urls.len(), sitemap = %sitemap_url, "discovered via configured sitemap");
                return urls;
            }
            warn!(sitemap = %sitemap_url, "configured sitemap yielded nothing");
        }

        for hinted in self.robots.sitemaps(&self.profile.base_url).await {
            let urls = resolver.resolve(&hinted).await;
            if !urls.is_empty() {
                info!(count = urls.len(), sitemap = %hinted, "discovered via robots.txt sitemap");
                return urls;
            }
        }

        if let Some(probed) = probe_sitemap(&self.client, &self.profile.base_url).await {
            let urls = resolver.resolve(&probed).await;
            if !urls.is_empty() {
                info!(count = urls.len(), sitemap = %probed, "discovered via probed sitemap");
                return urls;
            }
        }

        info!("no sitemap available, falling back to link crawl");
        let crawler = LinkCrawler::new(
            &self.client,
            &self.validator,
            &self.robots,
            &self.profile.include_patterns,
            &self.profile.exclude_patterns,
        );
        crawler
            .crawl(&self.profile.crawl_seeds(), self.profile.max_depth)
            .await
    }

    async fn run_sequential(&self, fetcher: &ContentFetcher, targets: &[FetchTarget]) -> FetchStats {
        let mut stats = FetchStats::default();
        let total = targets.len();
        for (index, target) in targets.iter().enumerate() {
            debug!(url = %target.url, progress = format!("{}/{total}", index + 1), "processing");
            match self.process_target(fetcher, target).await {
                Outcome::Fetched => {
                    stats.fetched += 1;
                    tokio::time::sleep(self.rate_limit.delay()).await;
                },
                Outcome::Skipped => stats.skipped += 1,
                Outcome::Errored => stats.errors += 1,
            }
        }
        stats
    }

    async fn run_concurrent(&self, fetcher: &ContentFetcher, targets: &[FetchTarget]) -> FetchStats {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent));
        let outcomes = join_all(targets.iter().map(|target| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                // The permit spans fetch and the politeness sleep, so a
                // slot self-paces before taking more work. Acquire only
                // fails if the semaphore is closed, which never happens
                // here.
                let Ok(_permit) = semaphore.acquire().await else {
                    return Outcome::Errored;
                };
                let outcome = self.process_target(fetcher, target).await;
                if outcome == Outcome::Fetched {
                    tokio::time::sleep(self.rate_limit.delay()).await;
                }
                outcome
            }
        }))
        .await;

        let mut stats = FetchStats::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Fetched => stats.fetched += 1,
                Outcome::Skipped => stats.skipped += 1,
                Outcome::Errored => stats.errors += 1,
            }
        }
        stats
    }

    /// One URL through the whole pipeline. Never propagates an error.
    async fn process_target(&self, fetcher: &ContentFetcher, target: &FetchTarget) -> Outcome {
        if !self.validator.validate(&target.url) {
            warn!(url = %target.url, "skipping invalid URL");
            return Outcome::Errored;
        }

        if !self.robots.is_allowed(&target.url).await {
            info!(url = %target.url, "skipping, blocked by robots.txt");
            return Outcome::Skipped;
        }

        let path = match storage::validate_output_path(&target.output_path, &self.config.output_root)
        {
            Ok(path) => path,
            Err(e) => {
                error!(url = %target.url, error = %e, "output path validation failed");
                return Outcome::Errored;
            },
        };

        if self.config.skip_existing && path.exists() {
            debug!(path = %path.display(), "skipping, file exists");
            return Outcome::Skipped;
        }

        match fetcher.fetch_page(&target.url).await {
            Ok(markdown) => {
                if self.cache.is_unchanged(&target.url, &markdown) {
                    debug!(url = %target.url, "content unchanged since last run");
                }
                if let Err(e) = storage::write_page(&path, &markdown).await {
                    error!(url = %target.url, error = %e, "write failed");
                    return Outcome::Errored;
                }
                info!(url = %target.url, path = %path.display(), "saved");
                Outcome::Fetched
            },
            Err(e) => {
                error!(url = %target.url, error = %e, category = e.category(), "page failed");
                // Content rejected by policy produces no file at all;
                // other failures leave a visible error page rather than
                // a silent hole. Either way the batch keeps going.
                if !matches!(e, Error::ContentPolicy(_) | Error::ResourceLimited(_)) {
                    let body = content::error_page(&target.url, &e);
                    if let Err(write_err) = storage::write_page(&path, &body).await {
                        warn!(url = %target.url, error = %write_err, "could not write error page");
                    }
                }
                Outcome::Errored
            },
        }
    }

    /// The hash cache, for callers that report on change detection.
    #[must_use]
    pub fn hash_cache(&self) -> &ContentHashCache {
        &self.cache
    }
}

impl std::fmt::Debug for FetchOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOrchestrator")
            .field("profile", &self.profile.name)
            .field("output_root", &self.config.output_root)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_profile(base: &str, sitemap: Option<String>) -> SiteProfile {
        SiteProfile {
            name: "test".into(),
            base_url: format!("{base}/"),
            sitemap_url: sitemap,
            start_urls: vec![],
            include_patterns: vec![],
            exclude_patterns: vec![],
            strip_prefix: None,
            output_subdir: "test".into(),
            max_depth: 2,
        }
    }

    fn test_config(output_root: &std::path::Path) -> FetcherConfig {
        FetcherConfig {
            output_root: output_root.to_path_buf(),
            rate_limit_secs: 0.0,
            retry_base_delay_secs: 0.0,
            max_retries: 0,
            ..FetcherConfig::default()
        }
    }

    fn orchestrator(config: FetcherConfig, profile: SiteProfile) -> FetchOrchestrator {
        FetchOrchestrator::with_validator(
            config,
            profile,
            UrlValidator::new().danger_allow_insecure(),
        )
        .unwrap()
    }

    async fn mount_page(server: &MockServer, page_path: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(page_path.to_string()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(body.to_string(), "text/html; charset=utf-8"),
            )
            .mount(server)
            .await;
    }

    async fn mount_sitemap(server: &MockServer, urls: &[String]) {
        let entries: String = urls
            .iter()
            .map(|u| format!("<url><loc>{u}</loc></url>"))
            .collect();
        Mock::given(method("GET"))
            .and(path("/sitemap.xml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(format!("<urlset>{entries}</urlset>"))
                    .insert_header("Content-Type", "application/xml"),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn full_run_with_robots_disallowed_url() {
        let server = MockServer::start().await;
        let base = server.uri();
        let out = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("User-agent: *\nDisallow: /secret/\nAllow: /\n"),
            )
            .mount(&server)
            .await;
        mount_sitemap(
            &server,
            &[
                format!("{base}/docs/a"),
                format!("{base}/docs/b"),
                format!("{base}/secret/c"),
            ],
        )
        .await;
        mount_page(&server, "/docs/a", "<html><body><main>A</main></body></html>").await;
        mount_page(&server, "/docs/b", "<html><body><main>B</main></body></html>").await;

        let profile = test_profile(&base, Some(format!("{base}/sitemap.xml")));
        let orch = orchestrator(test_config(out.path()), profile);
        let stats = orch.run().await.unwrap();

        assert_eq!(stats.fetched, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 0);

        assert!(out.path().join("test/docs/docs-a.md").exists());
        assert!(out.path().join("test/docs/docs-b.md").exists());
        assert!(!out.path().join("test/secret/secret-c.md").exists());
        // The hash cache sidecar is flushed at run end.
        assert!(out.path().join(crate::cache::HASH_CACHE_FILENAME).exists());
    }

    #[tokio::test]
    async fn skip_existing_makes_no_network_call() {
        let server = MockServer::start().await;
        let base = server.uri();
        let out = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_sitemap(&server, &[format!("{base}/docs/a")]).await;
        // The page itself is mounted with expect(0): any GET fails the test.
        Mock::given(method("GET"))
            .and(path("/docs/a"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        // Pre-create the destination file.
        let dest = out.path().join("test/docs/docs-a.md");
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(&dest, "already here").unwrap();

        let profile = test_profile(&base, Some(format!("{base}/sitemap.xml")));
        let orch = orchestrator(test_config(out.path()), profile);
        let stats = orch.run().await.unwrap();

        assert_eq!(stats.fetched, 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.errors, 0);
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "already here");
    }

    #[tokio::test]
    async fn page_failures_are_contained_per_url() {
        let server = MockServer::start().await;
        let base = server.uri();
        let out = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_sitemap(
            &server,
            &[
                format!("{base}/docs/good"),
                format!("{base}/docs/pdf"),
                format!("{base}/docs/down"),
            ],
        )
        .await;
        mount_page(&server, "/docs/good", "<html><body><main>ok</main></body></html>").await;
        Mock::given(method("GET"))
            .and(path("/docs/pdf"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("%PDF-1.4")
                    .insert_header("Content-Type", "application/pdf"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/docs/down"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let profile = test_profile(&base, Some(format!("{base}/sitemap.xml")));
        let orch = orchestrator(test_config(out.path()), profile);
        let stats = orch.run().await.unwrap();

        assert_eq!(stats.fetched, 1);
        assert_eq!(stats.errors, 2);

        // A disallowed content type produces no file at all.
        assert!(!out.path().join("test/docs/docs-pdf.md").exists());

        // A server failure leaves a visible error page in place.
        let error_page =
            std::fs::read_to_string(out.path().join("test/docs/docs-down.md")).unwrap();
        assert!(error_page.starts_with("# Error"));
        assert!(error_page.contains("/docs/down"));
    }

    #[tokio::test]
    async fn crawl_fallback_when_no_sitemap() {
        let server = MockServer::start().await;
        let base = server.uri();
        let out = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        // No sitemap anywhere: probe HEADs must miss.
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_page(
            &server,
            "/",
            &format!(
                "<html><body><main><a href=\"{base}/guide\">guide</a></main></body></html>"
            ),
        )
        .await;
        mount_page(&server, "/guide", "<html><body><main>G</main></body></html>").await;

        let profile = test_profile(&base, None);
        let orch = orchestrator(test_config(out.path()), profile);
        let stats = orch.run().await.unwrap();

        assert_eq!(stats.errors, 0);
        assert!(stats.fetched >= 2);
        assert!(out.path().join("test/guide.md").exists());
    }

    #[tokio::test]
    async fn max_pages_truncates_after_sorting() {
        let server = MockServer::start().await;
        let base = server.uri();
        let out = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_sitemap(
            &server,
            &[
                format!("{base}/docs/c"),
                format!("{base}/docs/a"),
                format!("{base}/docs/b"),
            ],
        )
        .await;
        mount_page(&server, "/docs/a", "<html><body><main>A</main></body></html>").await;
        mount_page(&server, "/docs/b", "<html><body><main>B</main></body></html>").await;

        let profile = test_profile(&base, Some(format!("{base}/sitemap.xml")));
        let mut config = test_config(out.path());
        config.max_pages = Some(2);
        let orch = orchestrator(config, profile);
        let stats = orch.run().await.unwrap();

        // Sorted order picks a and b; c is never requested.
        assert_eq!(stats.fetched, 2);
        assert!(out.path().join("test/docs/docs-a.md").exists());
        assert!(out.path().join("test/docs/docs-b.md").exists());
        assert!(!out.path().join("test/docs/docs-c.md").exists());
    }

    #[tokio::test]
    async fn sequential_mode_processes_in_order() {
        let server = MockServer::start().await;
        let base = server.uri();
        let out = TempDir::new().unwrap();

        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        mount_sitemap(&server, &[format!("{base}/docs/only")]).await;
        mount_page(&server, "/docs/only", "<html><body><main>solo</main></body></html>").await;

        let profile = test_profile(&base, Some(format!("{base}/sitemap.xml")));
        let mut config = test_config(out.path());
        config.sequential = true;
        let orch = orchestrator(config, profile);
        let stats = orch.run().await.unwrap();

        assert_eq!(stats.fetched, 1);
    }
}

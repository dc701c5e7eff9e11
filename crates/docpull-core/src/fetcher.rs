//! HTTP fetching with retry, size/time limits, and SSRF-hardened
//! redirects.
//!
//! The run owns a single [`reqwest::Client`] built by [`build_client`];
//! its redirect policy re-validates every hop through the run's
//! [`UrlValidator`], so a page that answers with a redirect into private
//! address space is cut off at the transport layer.
//!
//! Page retrieval is abstracted behind [`PageSource`]: the plain
//! [`HttpSource`] issues a GET, while the optional browser strategy in
//! [`crate::render`] renders JavaScript-heavy pages. Both produce HTML;
//! everything downstream is strategy-agnostic.
//!
//! Transient failures (429/5xx statuses, connection errors, timeouts)
//! are retried with exponential backoff plus jitter. Policy failures
//! (bad content type, oversized body) never retry.

use crate::validate::UrlValidator;
use crate::{Error, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Proxy, redirect};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum accepted page body size.
pub const MAX_CONTENT_SIZE: u64 = 50 * 1024 * 1024;

/// Wall-clock ceiling for one page download.
pub const MAX_DOWNLOAD_TIME: Duration = Duration::from_secs(300);

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// Status codes worth retrying: rate limiting and transient server
/// failures.
const RETRYABLE_STATUS: &[u16] = &[429, 500, 502, 503, 504];

/// Content types accepted for page bodies.
pub const ALLOWED_CONTENT_TYPES: &[&str] = &[
    "text/html",
    "application/xhtml+xml",
    "text/xml",
    "application/xml",
    "application/atom+xml",
    "application/rss+xml",
];

/// Build the run's HTTP client.
///
/// The redirect policy re-invokes `validator` on every hop and refuses
/// unsafe targets; the proxy, when configured, applies to all outbound
/// requests including robots.txt and sitemap fetches.
pub fn build_client(
    validator: Arc<UrlValidator>,
    user_agent: &str,
    proxy: Option<&str>,
) -> Result<Client> {
    let policy = redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }
        if validator.validate(attempt.url().as_str()) {
            attempt.follow()
        } else {
            attempt.error("redirect to unsafe URL blocked")
        }
    });

    let mut builder = Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(user_agent)
        .redirect(policy)
        .gzip(true)
        .brotli(true);

    if let Some(proxy_url) = proxy {
        builder = builder.proxy(
            Proxy::all(proxy_url)
                .map_err(|e| Error::Config(format!("invalid proxy URL {proxy_url}: {e}")))?,
        );
    }

    builder.build().map_err(Error::Network)
}

/// A way of turning a URL into rendered HTML.
///
/// Implementations: [`HttpSource`] (plain GET) and, behind the `browser`
/// feature, [`crate::render::BrowserSource`] (headless Chromium). The
/// strategy is chosen once at construction time.
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch one page's HTML.
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

/// Plain HTTP page source with retry and streaming limits.
pub struct HttpSource {
    client: Client,
    max_retries: u32,
    retry_base_delay_secs: f64,
}

impl HttpSource {
    /// Source sharing the run's client.
    #[must_use]
    pub fn new(client: Client, max_retries: u32, retry_base_delay_secs: f64) -> Self {
        Self {
            client,
            max_retries,
            retry_base_delay_secs,
        }
    }

    /// One attempt: GET, status check, content-type check, bounded body
    /// read, charset decode.
    async fn try_fetch(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        let response = response.error_for_status()?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if !content_type_allowed(&content_type) {
            return Err(Error::ContentPolicy(format!(
                "disallowed content type '{content_type}' for {url}"
            )));
        }

        if let Some(declared) = response.content_length() {
            if declared > MAX_CONTENT_SIZE {
                return Err(Error::ResourceLimited(format!(
                    "content length {declared} exceeds {MAX_CONTENT_SIZE} byte limit"
                )));
            }
        }

        let started = Instant::now();
        let mut body: Vec<u8> = Vec::new();
        let mut response = response;
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > MAX_CONTENT_SIZE {
                return Err(Error::ResourceLimited(format!(
                    "body exceeded {MAX_CONTENT_SIZE} byte limit for {url}"
                )));
            }
            if started.elapsed() > MAX_DOWNLOAD_TIME {
                return Err(Error::Timeout(format!(
                    "download exceeded {}s wall clock for {url}",
                    MAX_DOWNLOAD_TIME.as_secs()
                )));
            }
        }

        Ok(decode_body(&body, &content_type))
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch_html(&self, url: &str) -> Result<String> {
        let mut attempt: u32 = 0;
        loop {
            match self.try_fetch(url).await {
                Ok(html) => return Ok(html),
                Err(e) if attempt < self.max_retries && is_retryable(&e) => {
                    let delay = backoff_delay(self.retry_base_delay_secs, attempt);
                    warn!(
                        url,
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_secs = delay.as_secs_f64(),
                        "transient fetch failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                },
                Err(e) => {
                    debug!(url, error = %e, attempts = attempt + 1, "fetch failed");
                    return Err(e);
                },
            }
        }
    }
}

/// One page, end to end: strategy fetch, optional metadata extraction,
/// markdown assembly.
///
/// Policy gating (URL validation, robots, path containment) happens in
/// the orchestrator before this is invoked; the fetcher re-checks
/// nothing and concentrates on retrieval and conversion.
pub struct ContentFetcher {
    source: Arc<dyn PageSource>,
    rich_metadata: bool,
}

impl ContentFetcher {
    /// Fetcher over a chosen page source.
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, rich_metadata: bool) -> Self {
        Self {
            source,
            rich_metadata,
        }
    }

    /// Fetch one page and return its frontmattered markdown.
    pub async fn fetch_page(&self, url: &str) -> Result<String> {
        let html = self.source.fetch_html(url).await?;
        let metadata = if self.rich_metadata {
            Some(crate::metadata::extract(&html))
        } else {
            None
        };
        crate::content::assemble_page(url, &html, metadata.as_ref())
    }
}

/// Whether an error is worth another attempt.
fn is_retryable(error: &Error) -> bool {
    match error {
        Error::Network(e) => {
            if let Some(status) = e.status() {
                RETRYABLE_STATUS.contains(&status.as_u16())
            } else {
                e.is_timeout() || e.is_connect()
            }
        },
        Error::Timeout(_) => true,
        _ => false,
    }
}

/// Exponential backoff with jitter: `base * 2^attempt + uniform(0, 1)`
/// seconds.
fn backoff_delay(base_secs: f64, attempt: u32) -> Duration {
    let exponential = base_secs * f64::from(2_u32.saturating_pow(attempt.min(16)));
    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
    Duration::from_secs_f64(exponential + jitter)
}

/// Check a Content-Type header value against the allowlist.
///
/// An absent header is allowed; servers that omit it overwhelmingly
/// serve HTML.
#[must_use]
pub fn content_type_allowed(content_type: &str) -> bool {
    if content_type.is_empty() {
        return true;
    }
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    ALLOWED_CONTENT_TYPES.contains(&essence.as_str())
}

/// Decode a body to text: declared charset first, statistical detection
/// second, UTF-8 with replacement as the last resort.
fn decode_body(body: &[u8], content_type: &str) -> String {
    if let Some(charset) = charset_from_content_type(content_type) {
        if let Some(encoding) = encoding_rs::Encoding::for_label(charset.as_bytes()) {
            let (text, _, had_errors) = encoding.decode(body);
            if !had_errors {
                return text.into_owned();
            }
            debug!(charset, "declared charset failed to decode cleanly");
        }
    }

    let mut detector = chardetng::EncodingDetector::new();
    detector.feed(body, true);
    let detected = detector.guess(None, true);
    let (text, _, had_errors) = detected.decode(body);
    if !had_errors {
        return text.into_owned();
    }

    String::from_utf8_lossy(body).into_owned()
}

/// Pull the `charset=` parameter out of a Content-Type header.
fn charset_from_content_type(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|part| {
        let part = part.trim();
        part.to_lowercase()
            .strip_prefix("charset=")
            .map(|v| v.trim_matches(|c| c == '"' || c == '\'').to_string())
    })
}

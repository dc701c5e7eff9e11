//! Sitemap XML resolution for documentation discovery.
//!
//! Resolves a sitemap URL into a flat list of page URLs, following
//! sitemap-index children recursively. Hardened against hostile input:
//!
//! - the sitemap URL itself goes through [`UrlValidator`] before any
//!   request is made;
//! - bodies are streamed and abandoned once they exceed
//!   [`MAX_SITEMAP_BYTES`] (sitemap-bomb defense);
//! - `quick-xml` performs no external-entity or DTD expansion, so XXE
//!   and billion-laughs payloads parse as inert text or fail;
//! - index recursion carries a depth ceiling and a visited set, so a
//!   self-referential index terminates instead of recursing forever.
//!
//! A subtree that fails to fetch or parse contributes an empty list and
//! a warning; it never fails the whole resolution.

use crate::validate::UrlValidator;
use crate::{Error, Result};
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Timeout for a single sitemap fetch.
const SITEMAP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum accepted sitemap size.
pub const MAX_SITEMAP_BYTES: u64 = 50 * 1024 * 1024;

/// Maximum recursion depth for sitemap index files.
const MAX_INDEX_DEPTH: usize = 5;

/// URLs extracted from one sitemap document.
#[derive(Debug, Default, PartialEq, Eq)]
struct SitemapDoc {
    /// `<url><loc>` leaf page entries, in document order.
    pages: Vec<String>,
    /// `<sitemap><loc>` child sitemap entries (index documents).
    children: Vec<String>,
}

/// Recursive sitemap and sitemap-index resolver.
pub struct SitemapResolver {
    client: Client,
    validator: Arc<UrlValidator>,
    max_bytes: u64,
}

impl SitemapResolver {
    /// Resolver sharing the run's HTTP client and URL validator.
    #[must_use]
    pub fn new(client: Client, validator: Arc<UrlValidator>) -> Self {
        Self {
            client,
            validator,
            max_bytes: MAX_SITEMAP_BYTES,
        }
    }

    /// Override the per-sitemap size bound.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Resolve `sitemap_url` into a flattened list of page URLs.
    ///
    /// Children of an index document are resolved in order and their
    /// results concatenated, so resolving the same sitemap twice yields
    /// the same list in the same order.
    pub async fn resolve(&self, sitemap_url: &str) -> Vec<String> {
        let mut visited = HashSet::new();
        self.resolve_inner(sitemap_url.to_string(), 0, &mut visited)
            .await
    }

    fn resolve_inner<'a>(
        &'a self,
        url: String,
        depth: usize,
        visited: &'a mut HashSet<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Vec<String>> + Send + 'a>> {
        Box::pin(async move {
            if depth > MAX_INDEX_DEPTH {
                warn!(url, depth, "sitemap index recursion depth exceeded, pruning subtree");
                return Vec::new();
            }
            if !visited.insert(url.clone()) {
                warn!(url, "sitemap index cycle detected, pruning subtree");
                return Vec::new();
            }
            if !self.validator.validate(&url) {
                warn!(url, "refusing to fetch sitemap at unsafe URL");
                return Vec::new();
            }

            debug!(url, depth, "fetching sitemap");
            let xml = match self.fetch_bounded(&url).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(url, error = %e, "sitemap fetch failed");
                    return Vec::new();
                },
            };

            let doc = match parse_sitemap_doc(&xml) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(url, error = %e, "sitemap parse failed");
                    return Vec::new();
                },
            };

            let mut urls = doc.pages;
            for child in doc.children {
                debug!(child, "descending into child sitemap");
                let child_urls = self.resolve_inner(child, depth + 1, visited).await;
                urls.extend(child_urls);
            }
            urls
        })
    }

    /// Fetch a sitemap body, abandoning the transfer once it exceeds the
    /// configured size bound.
    async fn fetch_bounded(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .timeout(SITEMAP_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;

        if let Some(declared) = response.content_length() {
            if declared > self.max_bytes {
                return Err(Error::ResourceLimited(format!(
                    "sitemap declares {declared} bytes, limit is {}",
                    self.max_bytes
                )));
            }
        }

        let mut body = Vec::new();
        let mut response = response;
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > self.max_bytes {
                return Err(Error::ResourceLimited(format!(
                    "sitemap exceeded {} byte limit",
                    self.max_bytes
                )));
            }
        }
        Ok(body)
    }
}

/// Parse one sitemap document, collecting both leaf pages and index
/// children.
///
/// Elements are matched on local name, which accepts the standard
/// `http://www.sitemaps.org/schemas/sitemap/0.9` namespace, prefixed
/// variants, and the unnamespaced documents some sites serve.
fn parse_sitemap_doc(xml: &[u8]) -> Result<SitemapDoc> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(true);

    let mut doc = SitemapDoc::default();
    let mut buf = Vec::new();

    // Which container we are inside, and whether the cursor sits on a
    // <loc> element within it.
    let mut in_url = false;
    let mut in_sitemap = false;
    let mut in_loc = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"url" => in_url = true,
                b"sitemap" => in_sitemap = true,
                b"loc" if in_url || in_sitemap => in_loc = true,
                _ => {},
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" => in_url = false,
                b"sitemap" => in_sitemap = false,
                b"loc" => in_loc = false,
                _ => {},
            },
            Ok(Event::Text(e)) => {
                if in_loc {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::Parse(format!("invalid loc text: {e}")))?;
                    let loc = text.trim().to_string();
                    if loc.is_empty() {
                        continue;
                    }
                    if in_url {
                        doc.pages.push(loc);
                    } else if in_sitemap {
                        doc.children.push(loc);
                    }
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(Error::Parse(format!("XML parse error: {e}"))),
            _ => {},
        }
        buf.clear();
    }

    Ok(doc)
}

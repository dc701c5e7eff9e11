//! Substring include/exclude filtering of discovered URLs.

use tracing::info;

/// Keep URLs matching at least one include pattern and no exclude
/// pattern.
///
/// An empty include list keeps everything not excluded. Patterns are
/// plain substrings; a profile that needs more than substring matching
/// should pre-shape its URL space via `base_url` instead.
#[must_use]
pub fn filter_urls(urls: Vec<String>, include: &[String], exclude: &[String]) -> Vec<String> {
    let before = urls.len();
    let filtered: Vec<String> = urls
        .into_iter()
        .filter(|url| {
            let included = include.is_empty() || include.iter().any(|p| url.contains(p.as_str()));
            let excluded = exclude.iter().any(|p| url.contains(p.as_str()));
            included && !excluded
        })
        .collect();
    info!(before, after = filtered.len(), "filtered URL list");
    filtered
}

//! Rich page metadata extraction.
//!
//! Pulls Open Graph properties, article tags, and standard meta tags out
//! of a page for frontmatter enrichment. Extraction is best-effort:
//! every field is optional and a page with no usable metadata yields an
//! empty [`PageMetadata`], never an error.

use scraper::{Html, Selector};
use std::sync::LazyLock;

#[allow(clippy::expect_used)] // static selectors
mod selectors {
    use super::{LazyLock, Selector};

    pub static TITLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("title").expect("valid selector"));
    pub static META: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("meta").expect("valid selector"));
}

/// Metadata harvested from one page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    /// `og:title`, falling back to the `<title>` element.
    pub title: Option<String>,
    /// `og:description`, falling back to `meta[name=description]`.
    pub description: Option<String>,
    /// `meta[name=author]` or `article:author`.
    pub author: Option<String>,
    /// `meta[name=keywords]`, comma-split.
    pub keywords: Vec<String>,
    /// `og:image`.
    pub image: Option<String>,
    /// `og:type`.
    pub page_type: Option<String>,
    /// `og:site_name`.
    pub site_name: Option<String>,
    /// `article:published_time`.
    pub published_time: Option<String>,
    /// `article:modified_time`.
    pub modified_time: Option<String>,
    /// `article:section`.
    pub section: Option<String>,
    /// `article:tag` entries, in document order.
    pub tags: Vec<String>,
}

impl PageMetadata {
    /// True when nothing at all was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Extract metadata from page HTML.
#[must_use]
pub fn extract(html: &str) -> PageMetadata {
    let document = Html::parse_document(html);
    let mut meta = PageMetadata::default();

    for element in document.select(&selectors::META) {
        let value = element.value();
        let Some(content) = value.attr("content").map(str::trim) else {
            continue;
        };
        if content.is_empty() {
            continue;
        }

        // Open Graph and article namespaces use `property`, classic meta
        // tags use `name`; some sites mix them up, so accept either.
        let key = value
            .attr("property")
            .or_else(|| value.attr("name"))
            .unwrap_or_default();

        match key {
            "og:title" => meta.title = Some(content.to_string()),
            "og:description" => meta.description = Some(content.to_string()),
            "og:image" => meta.image = Some(content.to_string()),
            "og:type" => meta.page_type = Some(content.to_string()),
            "og:site_name" => meta.site_name = Some(content.to_string()),
            "article:published_time" => meta.published_time = Some(content.to_string()),
            "article:modified_time" => meta.modified_time = Some(content.to_string()),
            "article:section" => meta.section = Some(content.to_string()),
            "article:tag" => meta.tags.push(content.to_string()),
            "article:author" => {
                if meta.author.is_none() {
                    meta.author = Some(content.to_string());
                }
            },
            "author" => meta.author = Some(content.to_string()),
            "description" => {
                if meta.description.is_none() {
                    meta.description = Some(content.to_string());
                }
            },
            "keywords" => {
                meta.keywords = content
                    .split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .map(ToString::to_string)
                    .collect();
            },
            _ => {},
        }
    }

    if meta.title.is_none() {
        meta.title = document
            .select(&selectors::TITLE)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .filter(|t| !t.is_empty());
    }

    meta
}

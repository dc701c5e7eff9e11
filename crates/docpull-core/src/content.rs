//! HTML to markdown conversion with frontmatter.
//!
//! Takes rendered HTML and produces the markdown document that lands on
//! disk: non-content chrome stripped, the main content region selected
//! by a priority heuristic, converted with links and images preserved
//! and no line wrapping, and a frontmatter block prepended.

use crate::metadata::PageMetadata;
use crate::{Error, Result};
use chrono::Utc;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

#[allow(clippy::expect_used)] // static selectors and patterns, checked by tests
mod patterns {
    use super::{LazyLock, Regex, Selector};

    pub static CHROME: LazyLock<Selector> = LazyLock::new(|| {
        Selector::parse("script, style, nav, footer, header").expect("valid selector")
    });
    pub static MAIN: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("main").expect("valid selector"));
    pub static ARTICLE: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("article").expect("valid selector"));
    pub static BODY: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("body").expect("valid selector"));
    pub static ANY: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("*").expect("valid selector"));

    // Ids match loosely; classes must carry the keyword as a whole
    // dash/underscore-delimited token to avoid grabbing e.g.
    // "social-content-widget" wrappers ahead of the body.
    pub static ID_PATTERN: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)content|documentation|docs").expect("valid regex"));
    pub static CLASS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?i)^(?:content|documentation|docs)$|(?:^|-|_)(?:content|documentation|docs)(?:$|-|_)")
            .expect("valid regex")
    });
}

/// Assemble the final markdown document for a page.
///
/// Fails with a content-policy error only when no content region at all
/// can be located, which requires pathologically malformed input; the
/// `<body>` fallback otherwise guarantees a region.
pub fn assemble_page(url: &str, html: &str, metadata: Option<&PageMetadata>) -> Result<String> {
    let cleaned = strip_chrome(html);
    let region = select_main_content(&cleaned)
        .ok_or_else(|| Error::ContentPolicy(format!("no main content found for {url}")))?;

    let markdown = html2md::parse_html(&region);
    Ok(format!(
        "{}{}",
        frontmatter(url, metadata),
        markdown.trim()
    ))
}

/// Remove script/style/nav/footer/header subtrees.
fn strip_chrome(html: &str) -> Html {
    let mut document = Html::parse_document(html);
    let ids: Vec<_> = document.select(&patterns::CHROME).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    document
}

/// Select the main content region by priority: `<main>`, `<article>`,
/// an element whose id or class names a content/documentation/docs
/// region, then `<body>`.
fn select_main_content(document: &Html) -> Option<String> {
    if let Some(el) = document.select(&patterns::MAIN).next() {
        return Some(el.html());
    }
    if let Some(el) = document.select(&patterns::ARTICLE).next() {
        return Some(el.html());
    }
    for el in document.select(&patterns::ANY) {
        if let Some(id) = el.value().attr("id") {
            if patterns::ID_PATTERN.is_match(id) {
                return Some(el.html());
            }
        }
        if let Some(classes) = el.value().attr("class") {
            if classes
                .split_whitespace()
                .any(|c| patterns::CLASS_PATTERN.is_match(c))
            {
                return Some(el.html());
            }
        }
    }
    document.select(&patterns::BODY).next().map(|el| el.html())
}

/// Build the frontmatter block: the mandatory `url`/`fetched` pair plus
/// whatever rich metadata extraction produced.
fn frontmatter(url: &str, metadata: Option<&PageMetadata>) -> String {
    let mut lines = vec![
        "---".to_string(),
        format!("url: {url}"),
        format!("fetched: {}", Utc::now().format("%Y-%m-%d")),
    ];

    if let Some(meta) = metadata {
        if let Some(ref title) = meta.title {
            lines.push(format!("title: {title}"));
        }
        if let Some(ref description) = meta.description {
            lines.push(format!("description: {}", description.replace(':', "\\:")));
        }
        if let Some(ref author) = meta.author {
            lines.push(format!("author: {author}"));
        }
        if !meta.keywords.is_empty() {
            lines.push(format!("keywords: [{}]", meta.keywords.join(", ")));
        }
        if let Some(ref image) = meta.image {
            lines.push(format!("image: {image}"));
        }
        if let Some(ref page_type) = meta.page_type {
            lines.push(format!("type: {page_type}"));
        }
        if let Some(ref site_name) = meta.site_name {
            lines.push(format!("site_name: {site_name}"));
        }
        if let Some(ref published) = meta.published_time {
            lines.push(format!("published_time: {published}"));
        }
        if let Some(ref modified) = meta.modified_time {
            lines.push(format!("modified_time: {modified}"));
        }
        if let Some(ref section) = meta.section {
            lines.push(format!("section: {section}"));
        }
        if !meta.tags.is_empty() {
            lines.push(format!("tags: [{}]", meta.tags.join(", ")));
        }
    }

    lines.push("---".to_string());
    lines.push(String::new());
    lines.push(String::new());
    lines.join("\n")
}

/// Render a page-level failure as a visible markdown error block, so a
/// batch run leaves a record in place instead of a missing file.
#[must_use]
pub fn error_page(url: &str, error: &Error) -> String {
    format!("# Error\n\nFailed to fetch {url}\n\nError: {error}\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_scripts_and_nav() {
        let html = r"<html><body>
            <nav><a href='/'>home</a></nav>
            <main><h1>Title</h1><script>alert(1)</script><p>Body text</p></main>
            <footer>legal</footer>
        </body></html>";

        let page = assemble_page("https://example.com/p", html, None).unwrap();
        assert!(page.contains("Title"));
        assert!(page.contains("Body text"));
        assert!(!page.contains("alert(1)"));
        assert!(!page.contains("legal"));
        assert!(!page.contains("home"));
    }

    #[test]
    fn prefers_main_over_article_and_body() {
        let html = r"<html><body>
            <article><p>article text</p></article>
            <main><p>main text</p></main>
        </body></html>";
        let page = assemble_page("https://example.com/p", html, None).unwrap();
        assert!(page.contains("main text"));
        assert!(!page.contains("article text"));
    }

    #[test]
    fn falls_back_to_id_match() {
        let html = r#"<html><body>
            <div id="sidebar"><p>side</p></div>
            <div id="main-content"><p>the goods</p></div>
        </body></html>"#;
        let page = assemble_page("https://example.com/p", html, None).unwrap();
        assert!(page.contains("the goods"));
        assert!(!page.contains("side"));
    }

    #[test]
    fn class_match_requires_delimited_token() {
        assert!(patterns::CLASS_PATTERN.is_match("content"));
        assert!(patterns::CLASS_PATTERN.is_match("docs-page"));
        assert!(patterns::CLASS_PATTERN.is_match("site_documentation"));
        assert!(!patterns::CLASS_PATTERN.is_match("contentious"));
        assert!(!patterns::CLASS_PATTERN.is_match("docsify"));
    }

    #[test]
    fn falls_back_to_body() {
        let html = "<html><body><p>plain page</p></body></html>";
        let page = assemble_page("https://example.com/p", html, None).unwrap();
        assert!(page.contains("plain page"));
    }

    #[test]
    fn frontmatter_has_url_and_date() {
        let page =
            assemble_page("https://example.com/p", "<html><body>x</body></html>", None).unwrap();
        assert!(page.starts_with("---\nurl: https://example.com/p\nfetched: "));
        let closing = page.match_indices("---").count();
        assert!(closing >= 2, "frontmatter must be fenced");
    }

    #[test]
    fn metadata_fields_appear_with_escaped_colons() {
        let meta = PageMetadata {
            title: Some("Guide".into()),
            description: Some("intro: the basics".into()),
            keywords: vec!["a".into(), "b".into()],
            ..PageMetadata::default()
        };
        let page = assemble_page(
            "https://example.com/p",
            "<html><body>x</body></html>",
            Some(&meta),
        )
        .unwrap();
        assert!(page.contains("title: Guide"));
        assert!(page.contains("description: intro\\: the basics"));
        assert!(page.contains("keywords: [a, b]"));
    }

    #[test]
    fn links_survive_conversion() {
        let html = r#"<html><body><main>
            <p>See <a href="https://example.com/ref">the reference</a>.</p>
        </main></body></html>"#;
        let page = assemble_page("https://example.com/p", html, None).unwrap();
        assert!(page.contains("[the reference]"));
        assert!(page.contains("https://example.com/ref"));
    }

    #[test]
    fn error_page_names_url_and_cause() {
        let err = Error::ContentPolicy("disallowed content type".into());
        let page = error_page("https://example.com/bad", &err);
        assert!(page.starts_with("# Error"));
        assert!(page.contains("https://example.com/bad"));
        assert!(page.contains("disallowed content type"));
    }
}

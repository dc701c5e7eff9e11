//! URL discovery: sitemap resolution, link crawling, and filtering.
//!
//! Discovery runs in a fixed preference order: the profile's configured
//! sitemap, then sitemap URLs declared in robots.txt, then probing of
//! conventional sitemap locations, and finally a breadth-first link
//! crawl when no sitemap yields anything.

pub mod crawl;
pub mod filter;
pub mod probe;
pub mod sitemap;

pub use crawl::LinkCrawler;
pub use filter::filter_urls;
pub use probe::probe_sitemap;
pub use sitemap::SitemapResolver;

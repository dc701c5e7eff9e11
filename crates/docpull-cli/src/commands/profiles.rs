//! Listing of built-in site profiles.

use docpull_core::builtin_profiles;

/// Print the built-in profiles with the site each one targets.
pub fn list_profiles() {
    println!("Built-in site profiles:\n");
    for profile in builtin_profiles() {
        let sitemap = profile.sitemap_url.as_deref().unwrap_or("(crawl)");
        println!("  {:<10} {}  [{sitemap}]", profile.name, profile.base_url);
    }
    println!("\nUsage: docpull --profile <name>");
}

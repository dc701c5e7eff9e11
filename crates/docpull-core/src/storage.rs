//! Output tree layout and path safety.
//!
//! URLs map deterministically onto a file tree under the configured
//! output root: the URL path (minus the profile's base URL and optional
//! prefix) becomes nested directories, and the final component becomes a
//! sanitized `.md` filename. Before anything is written, the candidate
//! path is validated to be contained within the root, because URL path
//! segments are attacker-controlled input and must not climb out with
//! `..` tricks.

use crate::config::SiteProfile;
use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Maximum filename length before the `.md` suffix.
const MAX_FILENAME_LEN: usize = 200;

/// Derive a safe filename from a URL.
///
/// The base URL is stripped, slashes become hyphens, anything outside
/// `[A-Za-z0-9_.-]` becomes a hyphen, runs of hyphens collapse, and the
/// result is capped at 200 characters with a `.md` suffix enforced. An
/// empty or dot-only result becomes `index.md`.
#[must_use]
pub fn clean_filename(url: &str, base_url: &str) -> String {
    let path = url
        .strip_prefix(base_url)
        .unwrap_or(url)
        .trim_matches('/');

    let mut filename = String::with_capacity(path.len());
    let mut last_was_hyphen = false;
    for c in path.chars() {
        let mapped = if c.is_alphanumeric() || c == '_' || c == '.' {
            c
        } else {
            // '/' and every other non-word character collapse to '-'.
            '-'
        };
        if mapped == '-' {
            if !last_was_hyphen {
                filename.push('-');
            }
            last_was_hyphen = true;
        } else {
            filename.push(mapped);
            last_was_hyphen = false;
        }
    }
    let mut filename = filename.trim_matches('-').to_string();

    if filename.is_empty() || filename == "." || filename == ".." {
        filename = "index".to_string();
    }

    if filename.len() > MAX_FILENAME_LEN {
        // Back off to a char boundary so multibyte segments cannot panic.
        let mut cut = MAX_FILENAME_LEN;
        while !filename.is_char_boundary(cut) {
            cut -= 1;
        }
        filename.truncate(cut);
    }

    if !filename.ends_with(".md") {
        filename.push_str(".md");
    }

    filename
}

/// Map a page URL onto its output path for a profile.
///
/// The URL path below the base URL drives directory nesting: all but the
/// last segment become directories under the profile's subdirectory,
/// single-segment paths land directly in it, and a path that vanishes
/// entirely after prefix stripping falls into an `other` bucket.
#[must_use]
pub fn output_path(root: &Path, profile: &SiteProfile, url: &str) -> PathBuf {
    let path = url
        .strip_prefix(&profile.base_url)
        .unwrap_or(url)
        .trim_matches('/');

    let mut parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let had_segments = !parts.is_empty();

    if let Some(ref prefix) = profile.strip_prefix {
        if parts.first() == Some(&prefix.as_str()) {
            parts.remove(0);
        }
    }

    let subdir = root.join(&profile.output_subdir);
    let dir = match parts.len() {
        0 if had_segments => subdir.join("other"),
        0 | 1 => subdir,
        n => subdir.join(parts[..n - 1].join("/")),
    };

    dir.join(clean_filename(url, &profile.base_url))
}

/// Validate that `candidate` stays inside `root`.
///
/// Both paths are absolutized and lexically normalized (no filesystem
/// access, the candidate does not exist yet). Returns the normalized
/// candidate, or a security error on any escape.
pub fn validate_output_path(candidate: &Path, root: &Path) -> Result<PathBuf> {
    let resolved_root = normalize(&std::path::absolute(root)?);
    let resolved_candidate = normalize(&std::path::absolute(candidate)?);

    if resolved_candidate.starts_with(&resolved_root) {
        Ok(resolved_candidate)
    } else {
        Err(Error::Security(format!(
            "path traversal: {} escapes output root {}",
            candidate.display(),
            root.display()
        )))
    }
}

/// Lexically squash `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                result.pop();
            },
            other => result.push(other),
        }
    }
    result
}

/// Write a page to its (already validated) destination, creating parent
/// directories as needed.
pub async fn write_page(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, content).await?;
    debug!(path = %path.display(), bytes = content.len(), "wrote page");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteProfile;

    const BASE: &str = "https://docs.example.com/";

    fn profile() -> SiteProfile {
        SiteProfile {
            name: "example".into(),
            base_url: BASE.into(),
            sitemap_url: None,
            start_urls: vec![],
            include_patterns: vec![],
            exclude_patterns: vec![],
            strip_prefix: None,
            output_subdir: "example".into(),
            max_depth: 5,
        }
    }

    #[test]
    fn filename_is_sanitized_and_suffixed() {
        let name = clean_filename("https://docs.example.com/a/b c?d", BASE);
        assert!(!name.contains('/'));
        assert!(!name.contains(' '));
        assert!(!name.contains('?'));
        assert!(name.ends_with(".md"));
        assert_eq!(name, "a-b-c-d.md");
    }

    #[test]
    fn empty_path_becomes_index() {
        assert_eq!(clean_filename("https://docs.example.com/", BASE), "index.md");
    }

    #[test]
    fn long_names_are_capped_at_200_plus_suffix() {
        let long_segment = "x".repeat(500);
        let url = format!("https://docs.example.com/{long_segment}");
        let name = clean_filename(&url, BASE);
        assert!(name.len() <= MAX_FILENAME_LEN + 3);
        assert!(name.ends_with(".md"));
    }

    #[test]
    fn hyphen_runs_collapse() {
        let name = clean_filename("https://docs.example.com/a//b??c", BASE);
        assert_eq!(name, "a-b-c.md");
    }

    #[test]
    fn nested_path_maps_to_nested_directories() {
        let p = output_path(Path::new("out"), &profile(), "https://docs.example.com/guide/intro/setup");
        // Directories mirror all but the last segment; the filename
        // carries the full hyphenated path.
        assert_eq!(p, Path::new("out/example/guide/intro/guide-intro-setup.md"));
    }

    #[test]
    fn single_segment_lands_in_subdir() {
        let p = output_path(Path::new("out"), &profile(), "https://docs.example.com/faq");
        assert_eq!(p, Path::new("out/example/faq.md"));
    }

    #[test]
    fn root_page_lands_in_subdir_as_index() {
        let p = output_path(Path::new("out"), &profile(), "https://docs.example.com/");
        assert_eq!(p, Path::new("out/example/index.md"));
    }

    #[test]
    fn strip_prefix_drops_leading_segment_from_directories() {
        let mut prof = profile();
        prof.strip_prefix = Some("docs".into());
        let p = output_path(Path::new("out"), &prof, "https://docs.example.com/docs/api/fetch");
        assert_eq!(p, Path::new("out/example/api/docs-api-fetch.md"));
    }

    #[test]
    fn prefix_only_path_falls_into_other_bucket() {
        let mut prof = profile();
        prof.strip_prefix = Some("docs".into());
        let p = output_path(Path::new("out"), &prof, "https://docs.example.com/docs");
        assert_eq!(p, Path::new("out/example/other/docs.md"));
    }

    #[test]
    fn traversal_is_rejected() {
        let root = Path::new("/tmp/docpull-out");
        let attack = root.join("../../etc/passwd");
        let err = validate_output_path(&attack, root).unwrap_err();
        assert!(matches!(err, Error::Security(_)));
    }

    #[test]
    fn contained_path_resolves() {
        let root = Path::new("/tmp/docpull-out");
        let fine = root.join("a/b.md");
        let resolved = validate_output_path(&fine, root).unwrap();
        assert!(resolved.starts_with(root));
        assert!(resolved.ends_with("a/b.md"));
    }

    #[test]
    fn dotdot_inside_root_is_normalized_not_rejected() {
        let root = Path::new("/tmp/docpull-out");
        let wobbly = root.join("a/../b.md");
        let resolved = validate_output_path(&wobbly, root).unwrap();
        assert_eq!(resolved, root.join("b.md"));
    }

    #[tokio::test]
    async fn write_page_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("deep/nested/page.md");
        write_page(&dest, "# hello\n").await.unwrap();
        let read_back = tokio::fs::read_to_string(&dest).await.unwrap();
        assert_eq!(read_back, "# hello\n");
    }
}

//! Content-hash change detection.
//!
//! A hidden JSON sidecar under the output root maps each fetched URL to
//! the SHA-256 of the markdown last written for it. The cache is loaded
//! once at startup, updated on every successful fetch, and flushed at
//! run end. It feeds statistics only: an unchanged page is still
//! re-fetched; the cache records that its content did not move.

use crate::Result;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Sidecar filename under the output root.
pub const HASH_CACHE_FILENAME: &str = ".docpull-hashes.json";

/// Persisted `{url → sha256 hex}` map with synchronized updates.
pub struct ContentHashCache {
    path: PathBuf,
    hashes: Mutex<HashMap<String, String>>,
}

impl ContentHashCache {
    /// Load the cache from its sidecar under `output_root`.
    ///
    /// A missing or unreadable sidecar yields an empty cache; change
    /// detection degrades to "everything is new" rather than failing the
    /// run.
    #[must_use]
    pub fn load(output_root: &Path) -> Self {
        let path = output_root.join(HASH_CACHE_FILENAME);
        let hashes = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<HashMap<String, String>>(&content) {
                Ok(map) => {
                    debug!(entries = map.len(), "loaded content hash cache");
                    map
                },
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt hash cache, starting fresh");
                    HashMap::new()
                },
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            hashes: Mutex::new(hashes),
        }
    }

    /// SHA-256 hex digest of `content`.
    #[must_use]
    pub fn compute_hash(content: &str) -> String {
        let digest = Sha256::digest(content.as_bytes());
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Whether `content` matches the recorded hash for `url`.
    ///
    /// Updates the recorded hash when it differs, so the next run
    /// compares against what was just written.
    pub fn is_unchanged(&self, url: &str, content: &str) -> bool {
        let current = Self::compute_hash(content);
        #[allow(clippy::expect_used)] // poisoned only if another thread panicked
        let mut hashes = self.hashes.lock().expect("hash cache lock poisoned");
        if hashes.get(url) == Some(&current) {
            return true;
        }
        hashes.insert(url.to_string(), current);
        false
    }

    /// Number of recorded URLs.
    #[must_use]
    pub fn len(&self) -> usize {
        #[allow(clippy::expect_used)]
        self.hashes.lock().expect("hash cache lock poisoned").len()
    }

    /// True when nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush the cache to its sidecar file.
    pub fn save(&self) -> Result<()> {
        #[allow(clippy::expect_used)]
        let snapshot = {
            let hashes = self.hashes.lock().expect("hash cache lock poisoned");
            serde_json::to_string_pretty(&*hashes)?
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, snapshot)?;
        debug!(path = %self.path.display(), entries = self.len(), "saved content hash cache");
        Ok(())
    }
}

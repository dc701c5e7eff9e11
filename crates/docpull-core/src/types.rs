//! Core data types shared across the fetch pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// One unit of fetch work: a URL and the file it will be written to.
///
/// Produced by discovery + path mapping, consumed exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTarget {
    /// Page URL to fetch.
    pub url: String,
    /// Destination path, already mapped but not yet validated against
    /// the output root.
    pub output_path: PathBuf,
}

/// Counters reported at the end of a run.
///
/// Monotonically incremented, never reset mid-run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStats {
    /// Pages fetched and written.
    pub fetched: u64,
    /// Pages skipped by policy (robots, existing file, invalid URL).
    pub skipped: u64,
    /// Pages that failed.
    pub errors: u64,
}

impl FetchStats {
    /// Total number of URLs accounted for.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.fetched + self.skipped + self.errors
    }
}

impl std::fmt::Display for FetchStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "fetched: {}, skipped: {}, errors: {} (total {})",
            self.fetched,
            self.skipped,
            self.errors,
            self.total()
        )
    }
}

/// The run-wide effective politeness delay.
///
/// Starts at the configured `rate_limit_secs` and may only ever rise:
/// when a site's robots.txt declares a larger `Crawl-delay`, the gate
/// raises this value for the rest of the run. The raise is process-wide
/// and domain-agnostic, a conservative simplification for the common
/// single-domain run.
#[derive(Debug, Clone)]
pub struct RateLimit {
    millis: Arc<AtomicU64>,
}

impl RateLimit {
    /// A rate limit starting at `secs` seconds.
    #[must_use]
    pub fn from_secs(secs: f64) -> Self {
        let clamped = secs.max(0.0);
        Self {
            millis: Arc::new(AtomicU64::new((clamped * 1000.0) as u64)),
        }
    }

    /// Current delay to sleep between requests.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Relaxed))
    }

    /// Raise the delay to at least `secs` seconds. Lower values are
    /// ignored; the limit never decreases.
    pub fn raise_to(&self, secs: f64) -> bool {
        let candidate = (secs.max(0.0) * 1000.0) as u64;
        let previous = self.millis.fetch_max(candidate, Ordering::Relaxed);
        candidate > previous
    }
}

//! Error types and handling for docpull-core operations.
//!
//! Errors are categorized so the fetch pipeline can tell apart policy
//! rejections (never retried), transient network failures (retried with
//! backoff), and content-policy violations (page-level, non-fatal to a
//! batch). The [`Error::is_recoverable`] hint drives the retry loop in
//! [`crate::fetcher`].

use thiserror::Error;

/// The main error type for docpull-core operations.
///
/// All public functions in docpull-core return `Result<T, Error>`. The
/// variants map onto the failure classes of the fetch pipeline: I/O,
/// network, parsing, configuration, storage, and the safety policies
/// (URL validation, path containment, content limits).
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers filesystem operations: writing markdown output, creating
    /// directories, reading the hash-cache sidecar.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers HTTP requests for pages, sitemaps, and robots.txt. The
    /// underlying `reqwest::Error` is preserved so connection and timeout
    /// failures can be classified for retry.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Parsing operation failed.
    ///
    /// Malformed sitemap XML, unparseable HTML, or invalid URLs inside
    /// otherwise well-formed documents.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or inaccessible.
    ///
    /// Unlike page-level failures, configuration errors abort the run.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Storage operation failed.
    ///
    /// Output-tree bookkeeping beyond plain I/O, such as a hash cache
    /// that cannot be flushed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A safety policy rejected the operation.
    ///
    /// Non-HTTPS or internal-host URLs, redirects into private address
    /// space, and output paths escaping the configured root all land
    /// here. Never retryable.
    #[error("Security policy violation: {0}")]
    Security(String),

    /// The fetched content violated a content policy.
    ///
    /// Disallowed Content-Type, or a main-content region that could not
    /// be located. Page-level and never retryable.
    #[error("Content policy violation: {0}")]
    ContentPolicy(String),

    /// Resource limit was exceeded.
    ///
    /// Oversized bodies and sitemaps, download wall-clock overruns, and
    /// sitemap-index recursion past the depth ceiling.
    #[error("Resource limited: {0}")]
    ResourceLimited(String),

    /// Operation timed out.
    ///
    /// Used for render and download deadlines enforced outside the HTTP
    /// client's own timeout. Typically recoverable with retry.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Serialization or deserialization failed.
    ///
    /// JSON (hash cache) or TOML (config file) conversion errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Headless browser rendering failed.
    ///
    /// Launch failures, navigation errors, and render protocol errors
    /// from the optional browser strategy.
    #[error("Render error: {0}")]
    Render(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for failures that are typically temporary: network
    /// timeouts, connection resets, interrupted I/O. Policy and parse
    /// failures are permanent and must not be retried.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a static string identifier.
    ///
    /// Useful for grouping failures in logs and in the end-of-run stats
    /// summary.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::Storage(_) => "storage",
            Self::Security(_) => "security",
            Self::ContentPolicy(_) => "content-policy",
            Self::ResourceLimited(_) => "resource",
            Self::Timeout(_) => "timeout",
            Self::Serialization(_) => "serialization",
            Self::Render(_) => "render",
        }
    }
}

/// Convenient result type alias for docpull-core operations.
pub type Result<T> = std::result::Result<T, Error>;

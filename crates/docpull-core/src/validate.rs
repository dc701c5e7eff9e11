//! URL safety validation.
//!
//! [`UrlValidator`] is the single predicate deciding whether a URL may be
//! fetched at all: HTTPS only, optional host allowlist, and rejection of
//! anything that points into internal infrastructure (localhost, private
//! and reserved IP ranges, `.internal`/`.local` hostnames). The same
//! predicate is installed in the HTTP client's redirect policy, so a safe
//! initial URL cannot be bounced to an internal address mid-flight.
//!
//! The validator fails closed: any URL it cannot parse is rejected.

use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use tracing::warn;
use url::{Host, Url};

/// Judges whether a URL is safe to fetch.
#[derive(Debug, Clone, Default)]
pub struct UrlValidator {
    allowed_domains: Option<HashSet<String>>,
    danger_allow_insecure: bool,
}

impl UrlValidator {
    /// Validator with no domain allowlist: any public HTTPS host passes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator restricted to an exact-match set of hosts.
    #[must_use]
    pub fn with_allowed_domains(allowed_domains: Option<HashSet<String>>) -> Self {
        Self {
            allowed_domains,
            danger_allow_insecure: false,
        }
    }

    /// Accept `http` URLs and loopback hosts.
    ///
    /// This defeats the SSRF protections and exists solely so test
    /// suites can run the pipeline against local mock servers. The
    /// orchestrator and CLI never enable it.
    #[must_use]
    pub fn danger_allow_insecure(mut self) -> Self {
        self.danger_allow_insecure = true;
        self
    }

    /// Returns `true` when `url` is safe to fetch.
    ///
    /// Must be re-invoked on every redirect hop; see
    /// [`crate::fetcher::ContentFetcher`] which wires this into the
    /// redirect policy.
    #[must_use]
    pub fn validate(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            warn!(url, "rejected unparseable URL");
            return false;
        };

        let scheme_ok = parsed.scheme() == "https"
            || (self.danger_allow_insecure && parsed.scheme() == "http");
        if !scheme_ok {
            warn!(url, scheme = parsed.scheme(), "rejected non-HTTPS URL");
            return false;
        }

        let Some(host) = parsed.host() else {
            warn!(url, "rejected URL with no host");
            return false;
        };

        if let Some(ref allowed) = self.allowed_domains {
            // The allowlist matches the full authority host, port excluded.
            let host_str = match &host {
                Host::Domain(d) => (*d).to_string(),
                Host::Ipv4(ip) => ip.to_string(),
                Host::Ipv6(ip) => ip.to_string(),
            };
            if !allowed.contains(&host_str) {
                warn!(url, host = %host_str, "rejected host not in allowlist");
                return false;
            }
        }

        if self.danger_allow_insecure {
            return true;
        }

        match host {
            Host::Domain(domain) => {
                let lower = domain.to_lowercase();
                if lower == "localhost" || lower == "localhost.localdomain" {
                    warn!(url, "rejected localhost URL");
                    return false;
                }
                if lower.ends_with(".internal") || lower.ends_with(".local") {
                    warn!(url, "rejected internal domain");
                    return false;
                }
                true
            },
            Host::Ipv4(ip) => {
                if is_forbidden_ipv4(ip) {
                    warn!(url, ip = %ip, "rejected private/reserved IPv4 address");
                    return false;
                }
                true
            },
            Host::Ipv6(ip) => {
                if is_forbidden_ipv6(ip) {
                    warn!(url, ip = %ip, "rejected private/reserved IPv6 address");
                    return false;
                }
                true
            },
        }
    }
}

/// IPv4 ranges that must never be fetched: RFC 1918 private space plus
/// the RFC 5735 special-use blocks.
fn is_forbidden_ipv4(ip: Ipv4Addr) -> bool {
    let octets = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
        // Shared address space, RFC 6598 (100.64.0.0/10)
        || (octets[0] == 100 && (octets[1] & 0xc0) == 64)
        // IETF protocol assignments (192.0.0.0/24)
        || (octets[0] == 192 && octets[1] == 0 && octets[2] == 0)
        // Benchmarking (198.18.0.0/15)
        || (octets[0] == 198 && (octets[1] & 0xfe) == 18)
        // Reserved for future use (240.0.0.0/4)
        || octets[0] >= 240
}

fn is_forbidden_ipv6(ip: Ipv6Addr) -> bool {
    // An IPv4-mapped address smuggles a v4 target through a v6 literal.
    if let Some(v4) = ip.to_ipv4_mapped() {
        return is_forbidden_ipv4(v4);
    }
    let segments = ip.segments();
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // Unique local, fc00::/7
        || (segments[0] & 0xfe00) == 0xfc00
        // Link local, fe80::/10
        || (segments[0] & 0xffc0) == 0xfe80
        // Documentation, 2001:db8::/32
        || (segments[0] == 0x2001 && segments[1] == 0x0db8)
}

/// Standalone check for a literal address, used by tests and by callers
/// that already hold a parsed [`IpAddr`].
#[must_use]
pub fn is_forbidden_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_forbidden_ipv4(v4),
        IpAddr::V6(v6) => is_forbidden_ipv6(v6),
    }
}

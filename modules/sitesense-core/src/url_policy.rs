//! URL canonicalization and same-domain policy.
//!
//! Every URL entering the crawl goes through [`canonicalize`] exactly once;
//! the canonical string is the deduplication key for the whole invocation.
//! [`UrlPolicy`] additionally decides same-domain membership relative to the
//! crawl's start URL, treating `www.` and apex hosts as equivalent.

use crate::error::{UrlRejection, UrlResult};

const ALLOWED_SCHEMES: [&str; 2] = ["http", "https"];

/// Canonicalize a raw URL string.
///
/// The `url` crate lower-cases the host and drops default ports during
/// parsing; on top of that the fragment is stripped, the path and query are
/// preserved byte-for-byte (query parameters are never reordered), and any
/// trailing slash is trimmed so `…/page/` and `…/page` collide.
pub fn canonicalize(raw: &str) -> UrlResult<String> {
    let mut parsed = url::Url::parse(raw)?;

    if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
        return Err(UrlRejection::DisallowedScheme(parsed.scheme().to_string()));
    }
    if parsed.host_str().is_none() {
        return Err(UrlRejection::NoHost);
    }

    parsed.set_fragment(None);
    Ok(parsed.to_string().trim_end_matches('/').to_string())
}

/// Whether two (lower-cased) hosts name the same site, treating the
/// `www.`-prefixed and apex forms as interchangeable in both directions.
pub fn hosts_equivalent(a: &str, b: &str) -> bool {
    a == b || a.strip_prefix("www.") == Some(b) || b.strip_prefix("www.") == Some(a)
}

/// Same-domain membership policy anchored at a crawl's start URL.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    reference_host: String,
}

impl UrlPolicy {
    /// Build a policy from the (already canonical) start URL.
    pub fn for_origin(origin: &str) -> UrlResult<Self> {
        let parsed = url::Url::parse(origin)?;
        let host = parsed.host_str().ok_or(UrlRejection::NoHost)?;
        Ok(Self {
            reference_host: host.to_string(),
        })
    }

    pub fn reference_host(&self) -> &str {
        &self.reference_host
    }

    /// Canonicalize a discovered link and require it to be on the crawl's
    /// domain. The same equivalence backs both the enqueue decision and
    /// same-domain classification, so the two can never disagree.
    pub fn canonicalize_same_domain(&self, raw: &str) -> UrlResult<String> {
        let canonical = canonicalize(raw)?;
        // canonicalize only accepts URLs with a host
        let parsed = url::Url::parse(&canonical)?;
        let host = parsed.host_str().ok_or(UrlRejection::NoHost)?;

        if hosts_equivalent(host, &self.reference_host) {
            Ok(canonical)
        } else {
            Err(UrlRejection::CrossDomain(host.to_string()))
        }
    }
}

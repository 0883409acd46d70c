//! Content fingerprints for incremental change detection.
//!
//! The digest is taken over the clean markdown text rather than the raw
//! markup, so markup-only churn (attribute shuffles, tracking ids) never
//! triggers a re-embed.

use sha2::{Digest, Sha256};

/// SHA-256 hex digest of a page's clean text content.
pub fn fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Whether content changed since the last recorded fingerprint.
/// A page never fetched before (no prior fingerprint) counts as changed.
pub fn has_changed(previous: Option<&str>, current: &str) -> bool {
    match previous {
        Some(prev) => prev != current,
        None => true,
    }
}

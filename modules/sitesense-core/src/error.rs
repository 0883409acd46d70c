//! Typed rejection reasons for URL filtering.

use thiserror::Error;

/// Why a raw URL was dropped before ever reaching the fetch gateway.
///
/// The scrape service treats unfetchable inputs (javascript:, mailto:,
/// bare fragments) as client errors, so filtering here is a hard
/// precondition of dispatch, not an optimization.
#[derive(Debug, Error)]
pub enum UrlRejection {
    /// Scheme is not fetchable over HTTP(S) (e.g. javascript:, mailto:, tel:)
    #[error("disallowed URL scheme: {0}")]
    DisallowedScheme(String),

    /// URL has no host component
    #[error("URL has no host")]
    NoHost,

    /// Host does not belong to the crawl's reference domain
    #[error("cross-domain host: {0}")]
    CrossDomain(String),

    /// URL failed to parse at all
    #[error("URL parse error: {0}")]
    Unparseable(#[from] url::ParseError),
}

/// Result type alias for URL policy decisions.
pub type UrlResult<T> = std::result::Result<T, UrlRejection>;

pub mod categorize;
pub mod crawler;
pub mod fetcher;
pub mod frontier;

pub use crawler::{CrawlError, CrawlReport, Crawler};
pub use fetcher::{FetchError, FetchedPage, Fetcher, FirecrawlFetcher};
pub use frontier::Frontier;

pub mod embedder;
pub mod search;
pub mod store;

pub use embedder::{run_embed, EmbedReport};
pub use search::{format_results, run_search};
pub use store::PgPageStore;

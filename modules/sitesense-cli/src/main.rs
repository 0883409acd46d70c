use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use embed_client::EmbedClient;
use sitesense_core::storage::PageStore;
use sitesense_core::{AppConfig, CrawlConfig, ModelConfig, SearchConfig};
use sitesense_crawler::{Crawler, FirecrawlFetcher};
use sitesense_index::{format_results, run_embed, run_search, PgPageStore};

#[derive(Parser)]
#[command(
    name = "sitesense",
    about = "Crawl a website into a searchable semantic index"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Breadth-first crawl of a site through the scrape service
    Crawl {
        /// Start URL; the crawl stays on this domain (www and apex alike)
        url: String,
        /// Deepest link level to follow
        #[arg(long)]
        max_depth: Option<usize>,
        /// Page budget for this invocation
        #[arg(long)]
        max_pages: Option<usize>,
    },
    /// Embed every page whose content changed since the last pass
    Embed,
    /// Semantic search over the indexed chunks
    Search {
        /// Free-text query
        query: String,
        /// Number of results
        #[arg(long)]
        top_k: Option<i64>,
    },
    /// Index-wide counts
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let search_config = SearchConfig::default();
    let store = PgPageStore::connect(&config.database_url)
        .await?
        .with_ef_search(search_config.ef_search);
    store.migrate().await?;

    let model = match &config.embedding_model {
        Some(name) => ModelConfig::default().with_name(name),
        None => ModelConfig::default(),
    };

    match cli.command {
        Command::Crawl {
            url,
            max_depth,
            max_pages,
        } => {
            let mut crawl_config = CrawlConfig::default();
            if let Some(depth) = max_depth {
                crawl_config = crawl_config.with_max_depth(depth);
            }
            if let Some(pages) = max_pages {
                crawl_config = crawl_config.with_max_pages(pages);
            }

            let mut fetcher = FirecrawlFetcher::new(&config.firecrawl_url)
                .with_concurrency(crawl_config.concurrency)
                .with_min_interval(crawl_config.min_request_interval)
                .with_max_retries(crawl_config.max_retries);
            if let Some(key) = &config.firecrawl_api_key {
                fetcher = fetcher.with_api_key(key);
            }

            let report = Crawler::new(&fetcher, &store, crawl_config)
                .run(&url)
                .await?;
            print!("{report}");
        }
        Command::Embed => {
            let embedder = build_embedder(&config, &model);
            let report = run_embed(&store, &embedder, &model).await?;
            print!("{report}");
        }
        Command::Search { query, top_k } => {
            let embedder = build_embedder(&config, &model);
            let top_k = top_k.unwrap_or(search_config.top_k);
            info!(query = %query, top_k, "Searching");
            let hits = run_search(&store, &embedder, &query, top_k).await?;
            println!("{}", format_results(&hits));
        }
        Command::Stats => {
            let stats = store.stats().await?;
            print!("{stats}");
        }
    }

    Ok(())
}

fn build_embedder(config: &AppConfig, model: &ModelConfig) -> EmbedClient {
    let mut client =
        EmbedClient::new(&config.embeddings_url, &model.name).with_dimension(model.dimension);
    if let Some(key) = &config.embeddings_api_key {
        client = client.with_api_key(key);
    }
    client
}

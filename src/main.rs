use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use essenza::cascade::RenderedPage;
use essenza::catalog::{CatalogSync, RestCatalog};
use essenza::chrome::ChromeSession;
use essenza::config::AppConfig;
use essenza::images::ImageStore;
use essenza::pipeline::{parse_batch_input, ProductAggregator, QueryRequest};

/// Aggregate product identity (prices, sizes, descriptions, images) for
/// brand/product pairs from search results and rendered product pages.
#[derive(Parser, Debug)]
#[command(name = "essenza", version, about)]
struct Cli {
    /// Brand name; requires --product.
    #[arg(long, requires = "product", conflicts_with = "input")]
    brand: Option<String>,

    /// Product name; requires --brand.
    #[arg(long, requires = "brand")]
    product: Option<String>,

    /// Product page URL to refine prices/variants from.
    #[arg(long, requires = "brand")]
    url: Option<String>,

    /// Batch input file: "Brand:" lines followed by product lines.
    #[arg(long)]
    input: Option<std::path::PathBuf>,

    /// Download and store candidate images.
    #[arg(long, default_value_t = false)]
    save_images: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("essenza=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("loading configuration")?;

    let requests = build_requests(&cli)?;
    if requests.is_empty() {
        anyhow::bail!("nothing to do: pass --brand/--product or --input <file>");
    }

    let aggregator = ProductAggregator::new(&config)?;

    // One rendering session, reused sequentially across the batch. Only
    // started when some request actually has a page to visit.
    let session = if requests.iter().any(|r| r.product_url.is_some()) {
        match ChromeSession::new(&config.scraper) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(error = %e, "browser unavailable, continuing without page refinement");
                None
            }
        }
    } else {
        None
    };
    let page = session.as_ref().map(|s| s as &dyn RenderedPage);

    let outcomes = aggregator.run_batch(&requests, page).await;

    let image_store = if cli.save_images {
        Some(ImageStore::new(config.images.clone())?)
    } else {
        None
    };
    let catalog = if config.catalog.enabled {
        Some(RestCatalog::new(config.catalog.clone())?)
    } else {
        None
    };

    for outcome in &outcomes {
        let Some(record) = &outcome.record else {
            continue;
        };

        let stored = match &image_store {
            Some(store) => {
                store
                    .store_all(&record.brand, &record.product, &record.images)
                    .await
            }
            None => Vec::new(),
        };

        if let Some(catalog) = &catalog {
            match catalog.upsert(record, &stored).await {
                Ok(entry) => info!(id = entry.id, created = entry.created, "catalog synced"),
                Err(e) => warn!(title = %record.title(), error = %e, "catalog sync failed"),
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}

fn build_requests(cli: &Cli) -> Result<Vec<QueryRequest>> {
    if let Some(path) = &cli.input {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading batch input {}", path.display()))?;
        return Ok(parse_batch_input(&text));
    }

    if let (Some(brand), Some(product)) = (&cli.brand, &cli.product) {
        let mut request = QueryRequest::new(brand.clone(), product.clone());
        request.product_url = cli.url.clone();
        return Ok(vec![request]);
    }

    Ok(Vec::new())
}

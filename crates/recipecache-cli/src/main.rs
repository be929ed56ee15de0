//! Recipecache - browse the recipe catalog from the command line.
//!
//! Loads the catalog through the shared resource cache (disk first, then
//! network), prints it, and optionally prefetches recipe photos.

use std::io;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recipecache_core::models::{
    Catalog, Recipe, ALL_RECIPES_URL, EMPTY_RECIPES_URL, MALFORMED_RECIPES_URL,
};
use recipecache_core::{Bytes, CacheKey, Config, ResourceBox, ResourceCache};

// ============================================================================
// Constants
// ============================================================================

/// Maximum photo downloads in flight at once.
const MAX_CONCURRENT_PHOTOS: usize = 8;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Endpoint {
    All,
    Empty,
    Malformed,
}

impl Endpoint {
    fn url(self) -> &'static str {
        match self {
            Endpoint::All => ALL_RECIPES_URL,
            Endpoint::Empty => EMPTY_RECIPES_URL,
            Endpoint::Malformed => MALFORMED_RECIPES_URL,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "recipecache", version, about = "Browse the recipe catalog, cached locally")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Catalog URL (overrides config and --endpoint)
    #[arg(long, global = true)]
    url: Option<String>,

    /// One of the well-known catalog endpoints
    #[arg(long, value_enum, global = true)]
    endpoint: Option<Endpoint>,

    /// Only list recipes of this cuisine
    #[arg(long)]
    cuisine: Option<String>,

    /// Revalidate the cached catalog against the network
    #[arg(long)]
    refresh: bool,

    /// Prefetch recipe thumbnails into the cache
    #[arg(long)]
    photos: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Delete every cached file
    ClearCache,
}

/// Initialize the tracing subscriber for logging
fn init_tracing(verbose: bool) {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let default_filter = if verbose {
        "recipecache_core=debug,recipecache=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load()?;
    if let Some(url) = cli.url.clone() {
        config.catalog_url = Some(url);
    } else if let Some(endpoint) = cli.endpoint {
        config.catalog_url = Some(endpoint.url().to_string());
    }

    let cache_dir = config.cache_dir();
    debug!(?cache_dir, "Cache directory configured");
    let cache = ResourceCache::with_http(cache_dir, config.request_timeout())?;

    match cli.command {
        Some(Command::ClearCache) => {
            cache.clear_cache()?;
            println!("Cleared {}", cache.cache_dir().display());
            Ok(())
        }
        None => browse(&cache, &config, &cli).await,
    }
}

async fn browse(cache: &ResourceCache, config: &Config, cli: &Cli) -> Result<()> {
    let url = config.catalog_url()?;
    info!(url = %url, "Loading catalog");
    let resource = cache.resource_for(&CacheKey::<Catalog>::for_type(url))?;

    let catalog = if cli.refresh {
        // Show what's on disk now, wait for the network copy
        resource.load(true);
        resource.fetch().await
    } else {
        resource.await_value().await
    }
    .context("Failed to load recipe catalog")?;

    print_catalog(&resource, &catalog, cli.cuisine.as_deref());

    if cli.photos {
        prefetch_photos(cache, &catalog).await;
    }
    Ok(())
}

fn print_catalog(resource: &ResourceBox<Catalog>, catalog: &Catalog, cuisine: Option<&str>) {
    if catalog.is_empty() {
        println!("No recipes available.");
        return;
    }

    let age = resource.age_display().unwrap_or_else(|| "not cached".to_string());
    println!(
        "{} recipes, {} cuisines (cached {})",
        catalog.recipes.len(),
        catalog.cuisines.len(),
        age
    );

    let recipes: Vec<&Recipe> = match cuisine {
        Some(cuisine) => catalog.select(cuisine),
        None => catalog.recipes.iter().collect(),
    };
    if recipes.is_empty() {
        println!(
            "No {} recipes. Cuisines: {}",
            cuisine.unwrap_or_default(),
            catalog.cuisines.join(", ")
        );
        return;
    }
    for recipe in recipes {
        println!("  {:<40} {}", recipe.name, recipe.cuisine);
    }
}

async fn prefetch_photos(cache: &ResourceCache, catalog: &Catalog) {
    let keys: Vec<CacheKey<Bytes>> = catalog
        .recipes
        .iter()
        .filter_map(|r| r.thumbnail_url().cloned())
        .map(CacheKey::for_type)
        .collect();

    let total = keys.len();
    let fetched = stream::iter(keys)
        .map(|key| async move {
            let resource = cache.resource_for(&key)?;
            resource.await_value().await.map(|_| ())
        })
        .buffer_unordered(MAX_CONCURRENT_PHOTOS)
        .filter_map(|result| async move {
            match result {
                Ok(()) => Some(()),
                Err(e) => {
                    warn!(error = %e, "Failed to fetch photo");
                    None
                }
            }
        })
        .count()
        .await;

    println!("Cached {} of {} photos", fetched, total);
}

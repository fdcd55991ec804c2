//! Driver binary: reads `EDGAR_YEAR`, `EDGAR_QUARTER`,
//! `EDGAR_MONTH`, `FORM_TYPES`, `CLIENT_TYPE` and its backend-specific credentials
//! from the process environment and runs `process_all_filing_index` once, draining
//! the resulting index/filing tasks through an in-process worker.
//!
//! This crate's own `examples/` directory is reserved for retrieved reference
//! material, so the driver lives here instead of as a cargo example.

use std::sync::Arc;

use edgar_ingest::blob_store::ObjectStoreBlobStore;
use edgar_ingest::catalogue::{CatalogueStore, InMemoryCatalogueStore, PgCatalogueStore};
use edgar_ingest::config::IngestConfig;
use edgar_ingest::core::Edgar;
use edgar_ingest::error::{EdgarError, Result};
use edgar_ingest::processes::process_all_filing_index;
use edgar_ingest::tasks::{InMemoryTaskQueue, TaskHandlers, TaskQueue, Worker};
use edgar_ingest::text_extractor::{NullTextExtractor, TikaTextExtractor, TextExtractor};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = IngestConfig::from_env()?;

    let year = std::env::var("EDGAR_YEAR")
        .map_err(|_| EdgarError::ConfigError("missing EDGAR_YEAR".into()))?
        .parse::<i32>()
        .map_err(|e| EdgarError::ConfigError(format!("invalid EDGAR_YEAR: {e}")))?;
    let quarter = std::env::var("EDGAR_QUARTER").ok().and_then(|v| v.parse::<u8>().ok());
    let month = std::env::var("EDGAR_MONTH").ok().and_then(|v| v.parse::<u8>().ok());
    let form_types: Vec<String> = std::env::var("FORM_TYPES")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let edgar = Edgar::with_config(config.edgar.clone())?;
    let blob_store = Arc::new(
        ObjectStoreBlobStore::new(&config.blob_store, config.zlib_compression_level).await?,
    );

    let catalogue: Arc<dyn CatalogueStore> = match connect_catalogue(&config.database_url).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("catalogue unavailable at startup: {e}");
            return Err(e);
        }
    };

    let text_extractor: Arc<dyn TextExtractor> = match &config.tika_url {
        Some(url) => Arc::new(TikaTextExtractor::new(url.clone())),
        None => Arc::new(NullTextExtractor),
    };

    let queue: Arc<dyn TaskQueue> = Arc::new(InMemoryTaskQueue::new());
    let handlers = Arc::new(TaskHandlers {
        blob_store,
        catalogue,
        edgar,
        text_extractor,
        queue: Some(queue.clone()),
    });

    process_all_filing_index(handlers.clone(), queue.clone(), year, quarter, month, form_types).await?;

    let worker = Worker::new(queue, handlers);
    let processed = worker.drain().await?;
    tracing::info!(processed, "ingest run complete");

    Ok(())
}

/// Connects to the configured Postgres catalogue and runs pending migrations. Falls
/// back to an in-process, non-persistent catalogue only when explicitly requested via
/// `DATABASE_URL=memory`, which is convenient for local smoke runs against a real
/// EDGAR/object-store pair without standing up Postgres.
async fn connect_catalogue(database_url: &str) -> Result<Arc<dyn CatalogueStore>> {
    if database_url == "memory" {
        tracing::warn!("DATABASE_URL=memory: using a non-persistent in-memory catalogue");
        return Ok(Arc::new(InMemoryCatalogueStore::new()));
    }

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .map_err(EdgarError::Catalogue)?;
    PgCatalogueStore::migrate(&pool).await?;
    Ok(Arc::new(PgCatalogueStore::new(pool)))
}

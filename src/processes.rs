//! High-level driver processes, driven from `src/bin/ingest.rs`: reconcile
//! EDGAR's remote index listing with what the catalogue already has, and dispatch one
//! `ProcessFilingIndex` task per index file that still needs downloading.

use std::sync::Arc;

use super::core::Edgar;
use super::error::Result;
use super::tasks::{Task, TaskHandlers, TaskQueue};

/// Downloads every quarterly/daily index file in range that the blob store doesn't
/// already have a verbatim mirror of, under `edgar/full-index/…`. Returns the list of index paths it newly downloaded.
pub async fn download_filing_index_data(
    handlers: &TaskHandlers,
    min_year: i32,
    max_year: i32,
) -> Result<Vec<String>> {
    let index_paths = handlers.edgar.list_index(min_year, max_year).await?;
    let mut downloaded = Vec::new();

    for path in index_paths {
        let key = blob_key_for(&path);
        if handlers.blob_store.exists(&key).await? {
            continue;
        }
        let (bytes, _) = handlers.edgar.get_buffer(&path).await?;
        let Some(bytes) = bytes else {
            tracing::warn!(path, "index file unavailable during mirror download");
            continue;
        };
        handlers.blob_store.put(&key, bytes, false).await?;
        downloaded.push(key);
    }

    Ok(downloaded)
}

/// Drives the whole pipeline for one period: mirrors the index
/// tree, then dispatches one `ProcessFilingIndex` task per downloaded (or already
/// present) index file matching `year`/`quarter`/`month`, filtered to `form_types`.
pub async fn process_all_filing_index(
    handlers: Arc<TaskHandlers>,
    queue: Arc<dyn TaskQueue>,
    year: i32,
    quarter: Option<u8>,
    month: Option<u8>,
    form_types: Vec<String>,
) -> Result<()> {
    let index_paths = resolve_index_paths(&handlers.edgar, year, quarter, month).await?;

    for path in index_paths {
        let key = blob_key_for(&path);
        if !handlers.blob_store.exists(&key).await? {
            let (bytes, _) = handlers.edgar.get_buffer(&path).await?;
            let Some(bytes) = bytes else {
                tracing::warn!(path, "index file unavailable, skipping");
                continue;
            };
            handlers.blob_store.put(&key, bytes, false).await?;
        }

        queue
            .enqueue(Task::ProcessFilingIndex {
                file_path: key,
                form_type_filter: if form_types.is_empty() { None } else { Some(form_types.clone()) },
                store_raw: true,
                store_text: true,
            })
            .await?;
    }

    Ok(())
}

async fn resolve_index_paths(edgar: &Edgar, year: i32, quarter: Option<u8>, month: Option<u8>) -> Result<Vec<String>> {
    if let Some(month) = month {
        return edgar.list_index_by_month(year, month).await;
    }
    if let Some(quarter) = quarter {
        return edgar.list_index_by_quarter(year, quarter).await;
    }
    edgar.list_index_by_year(year).await
}

/// Maps an absolute EDGAR archives path (e.g. `/Archives/edgar/full-index/1994/QTR3/form.idx`)
/// to its mirrored blob store key under `edgar/full-index/…`.
fn blob_key_for(archives_path: &str) -> String {
    archives_path
        .trim_start_matches('/')
        .trim_start_matches("Archives/")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_key_strips_archives_prefix() {
        assert_eq!(
            blob_key_for("/Archives/edgar/full-index/1994/QTR3/form.idx"),
            "edgar/full-index/1994/QTR3/form.idx"
        );
    }
}

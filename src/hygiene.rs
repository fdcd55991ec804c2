//! Hygiene sweeps over already-stored artifacts: repair objects that turned out
//! to be one of EDGAR's sentinel error bodies rather than genuine filing content, or
//! that were stored empty because a prior fetch silently failed.
//!
//! Each sweep scans under `edgar/data/<cik>/` (a single CIK) or `edgar/data/` (all CIKs)
//! and, for every matching key, either repairs it by re-fetching from EDGAR or deletes
//! it outright, depending on which sentinel it matches.

use super::blob_store::BlobStore;
use super::core::{detect_sentinel, Edgar, RATE_LIMIT_BODY_SIZE};
use super::error::{Result, SentinelKind};

fn scan_prefix(cik: Option<u64>) -> String {
    match cik {
        Some(cik) => format!("edgar/data/{cik}/"),
        None => "edgar/data/".to_string(),
    }
}

/// Replaces objects matching the rate-limit sentinel's exact byte-length heuristic
/// by re-fetching from EDGAR. Returns the paths it touched.
pub async fn clean_rate_limited_files(
    store: &dyn BlobStore,
    edgar: &Edgar,
    cik: Option<u64>,
    fix: bool,
) -> Result<Vec<String>> {
    let prefix = scan_prefix(cik);
    let keys = store.list(&prefix).await?;
    let mut repaired = Vec::new();

    for key in keys {
        let body = store.get(&key, false).await?;
        if body.len() != RATE_LIMIT_BODY_SIZE {
            continue;
        }
        if detect_sentinel(&body) != Some(SentinelKind::RateLimited) {
            continue;
        }
        if fix {
            refetch_and_replace(store, edgar, &key).await?;
        }
        repaired.push(key);
    }

    Ok(repaired)
}

/// Replaces zero-byte objects by re-fetching from EDGAR. Returns the paths it touched.
pub async fn clean_empty_files(
    store: &dyn BlobStore,
    edgar: &Edgar,
    cik: Option<u64>,
    fix: bool,
) -> Result<Vec<String>> {
    let prefix = scan_prefix(cik);
    let keys = store.list(&prefix).await?;
    let mut repaired = Vec::new();

    for key in keys {
        let body = store.get(&key, false).await?;
        if !body.is_empty() {
            continue;
        }
        if fix {
            refetch_and_replace(store, edgar, &key).await?;
        }
        repaired.push(key);
    }

    Ok(repaired)
}

/// Deletes objects matching the access-denied sentinel body. Returns the paths it deleted.
pub async fn clean_access_denied_files(
    store: &dyn BlobStore,
    cik: Option<u64>,
    fix: bool,
) -> Result<Vec<String>> {
    let prefix = scan_prefix(cik);
    let keys = store.list(&prefix).await?;
    let mut deleted = Vec::new();

    for key in keys {
        let body = store.get(&key, false).await?;
        if detect_sentinel(&body) != Some(SentinelKind::AccessDenied) {
            continue;
        }
        if fix {
            store.delete(&key).await?;
        }
        deleted.push(key);
    }

    Ok(deleted)
}

/// Re-fetches `key` (interpreted as an EDGAR archives path) and replaces the stored
/// object only if the new body is non-empty.
async fn refetch_and_replace(store: &dyn BlobStore, edgar: &Edgar, key: &str) -> Result<()> {
    let path = key.trim_start_matches("edgar/");
    let (body, _) = edgar.get_buffer(&format!("/Archives/edgar/{path}")).await?;
    if let Some(body) = body {
        if !body.is_empty() {
            store.put(key, body, false).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BlobStoreConfig;
    use crate::blob_store::ObjectStoreBlobStore;

    async fn local_store() -> (ObjectStoreBlobStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = BlobStoreConfig::Local { root: dir.path().to_path_buf() };
        let store = ObjectStoreBlobStore::new(&config, 6).await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn clean_access_denied_deletes_matching_objects_when_fix() {
        let (store, _dir) = local_store().await;
        let body = b"<Error><Code>AccessDenied</Code><Message>x</Message></Error>".to_vec();
        store.put("edgar/data/1/a.txt", body, false).await.unwrap();

        let deleted = clean_access_denied_files(&store, None, true).await.unwrap();
        assert_eq!(deleted, vec!["edgar/data/1/a.txt".to_string()]);
        assert!(!store.exists("edgar/data/1/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn clean_access_denied_leaves_ordinary_objects_alone() {
        let (store, _dir) = local_store().await;
        store.put("edgar/data/1/a.txt", b"ordinary filing text".to_vec(), false).await.unwrap();

        let deleted = clean_access_denied_files(&store, None, true).await.unwrap();
        assert!(deleted.is_empty());
        assert!(store.exists("edgar/data/1/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn dry_run_reports_without_deleting() {
        let (store, _dir) = local_store().await;
        let body = b"<Error><Code>AccessDenied</Code><Message>x</Message></Error>".to_vec();
        store.put("edgar/data/1/a.txt", body, false).await.unwrap();

        let found = clean_access_denied_files(&store, None, false).await.unwrap();
        assert_eq!(found.len(), 1);
        assert!(store.exists("edgar/data/1/a.txt").await.unwrap());
    }
}

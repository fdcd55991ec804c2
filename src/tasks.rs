//! Task orchestration: explicit descriptors dispatched through
//! a queue abstraction rather than runtime-registered functions, so an operator can wire
//! the same `TaskHandlers` to an in-process queue (tests, single-process runs) or a real
//! broker without touching the handler bodies.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::blob_store::BlobStore;
use super::catalogue::{CatalogueStore, NewFiling, NewFilingDocument};
use super::core::{to_archive_path, to_blob_key, Edgar};
use super::error::Result;
use super::filing_parser::{decode_envelope, parse_filing, sha1_hex};
use super::index_parser::parse_index_file;
use super::text_extractor::TextExtractor;

/// One unit of dispatchable work. Payloads carry everything a handler needs;
/// nothing is looked up from ambient state.
#[derive(Debug, Clone)]
pub enum Task {
    ProcessFilingIndex {
        file_path: String,
        form_type_filter: Option<Vec<String>>,
        store_raw: bool,
        store_text: bool,
    },
    ProcessFiling {
        store_path: String,
        envelope_bytes: Option<Vec<u8>>,
        store_raw: bool,
        store_text: bool,
    },
    SearchDocument {
        sha1: String,
        terms: Vec<String>,
        query_id: i64,
        document_id: i64,
        case_sensitive: bool,
        token: bool,
        stem: bool,
    },
    ExtractDocumentData { sha1: String, document_id: i64 },
}

/// Dispatch seam an operator wires to a real broker; [`InMemoryTaskQueue`]
/// is the in-process default for tests and single-process operation.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: Task) -> Result<()>;
    async fn try_dequeue(&self) -> Option<Task>;
}

#[derive(Default)]
pub struct InMemoryTaskQueue {
    queue: Mutex<VecDeque<Task>>,
}

impl InMemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskQueue for InMemoryTaskQueue {
    async fn enqueue(&self, task: Task) -> Result<()> {
        self.queue.lock().await.push_back(task);
        Ok(())
    }

    async fn try_dequeue(&self) -> Option<Task> {
        self.queue.lock().await.pop_front()
    }
}

/// Implements the five task bodies against the blob store, catalogue, EDGAR client, and
/// text extractor. One instance is shared (behind an `Arc`) across a worker fleet.
pub struct TaskHandlers {
    pub blob_store: Arc<dyn BlobStore>,
    pub catalogue: Arc<dyn CatalogueStore>,
    pub edgar: Edgar,
    pub text_extractor: Arc<dyn TextExtractor>,
    /// Queue new `ProcessFiling` subtasks onto rather than handling them inline — `None`
    /// runs them inline within `process_filing_index` instead.
    pub queue: Option<Arc<dyn TaskQueue>>,
}

impl TaskHandlers {
    /// `process_filing_index`: downloads (if not cached), parses, and for every row
    /// passing `form_type_filter`, ensures a Filing exists — either by dispatching a
    /// `ProcessFiling` subtask or, with no queue configured, running it inline.
    pub async fn process_filing_index(
        &self,
        file_path: &str,
        form_type_filter: Option<&[String]>,
        store_raw: bool,
        store_text: bool,
    ) -> Result<()> {
        let raw = self.fetch_or_cached(file_path).await?;
        let Some(raw) = raw else {
            tracing::warn!(file_path, "index file unavailable, skipping");
            return Ok(());
        };

        let records = parse_index_file(&raw);
        let total = records.len() as i64;
        let mut bad = 0i64;

        for record in &records {
            if let Some(filter) = form_type_filter {
                if !filter.iter().any(|f| f.eq_ignore_ascii_case(&record.form_type)) {
                    continue;
                }
            }

            let filing_path = record.file_name.clone();
            let existing = self.catalogue.filings_at_store_path(&filing_path).await?;
            if existing.len() > 1 {
                tracing::warn!(filing_path, "ambiguous Filing rows at store_path, skipping");
                continue;
            }
            if existing.len() == 1 {
                continue;
            }

            // With a queue configured, the subtask's own outcome is observed later (and
            // separately) by whatever drains that queue; only the inline path can fold a
            // `ProcessFiling` failure back into this index's `bad_record_count` directly.
            let succeeded = match &self.queue {
                Some(queue) => {
                    queue
                        .enqueue(Task::ProcessFiling {
                            store_path: filing_path.clone(),
                            envelope_bytes: None,
                            store_raw,
                            store_text,
                        })
                        .await?;
                    true
                }
                None => self
                    .process_filing(&filing_path, None, store_raw, store_text)
                    .await?,
            };

            if !succeeded {
                bad += 1;
                self.create_filing_error(record.cik, &record.company_name, &filing_path)
                    .await?;
            }
        }

        self.catalogue
            .upsert_filing_index(
                file_path,
                None,
                total,
                bad,
                true,
                false,
                Some(Utc::now().date_naive()),
            )
            .await?;

        Ok(())
    }

    /// `process_filing`: parses the envelope, resolves/creates the Company and its
    /// date-aligned CompanyInfo, persists the Filing and its documents, and uploads
    /// content-addressed artifacts. Idempotent on `store_path`.
    ///
    /// Returns `Ok(true)` on success (including the idempotent short-circuit) and
    /// `Ok(false)` when the envelope could not be fetched, decoded, or attributed to a
    /// CIK — the caller (`process_filing_index`) folds `Ok(false)` into its
    /// `bad_record_count` and records a `create_filing_error` row. Catalogue/store
    /// failures still propagate as `Err`.
    pub async fn process_filing(
        &self,
        store_path: &str,
        envelope_bytes: Option<Vec<u8>>,
        store_raw: bool,
        store_text: bool,
    ) -> Result<bool> {
        if !self.catalogue.filings_at_store_path(store_path).await?.is_empty() {
            return Ok(true);
        }

        let bytes = match envelope_bytes {
            Some(b) => b,
            None => match self.fetch_or_cached(store_path).await? {
                Some(b) => b,
                None => {
                    tracing::warn!(store_path, "envelope unavailable, treating as a bad record");
                    return Ok(false);
                }
            },
        };

        let Some(text) = decode_envelope(&bytes) else {
            tracing::warn!(store_path, "envelope could not be decoded under any known charset");
            return Ok(false);
        };

        // `parse_filing`'s extraction callback is synchronous; text extraction itself
        // (an async call to the external service) happens separately below, once
        // per document, after the envelope has been fully parsed.
        let record = parse_filing(&text, |_content| None);

        let Some(cik) = record.cik else {
            tracing::debug!(store_path, "envelope missing CIK, abandoning");
            return Ok(false);
        };

        let company = self
            .catalogue
            .get_or_create_company(cik, record.company_name.as_deref().unwrap_or_default())
            .await?;

        if let Some(date_filed) = record.date_filed.as_deref().and_then(parse_compact_date) {
            self.catalogue
                .get_or_create_company_info(
                    company.id,
                    date_filed,
                    record.company_name.as_deref().unwrap_or_default(),
                    record.sic.as_deref(),
                    record.state_location.as_deref(),
                    record.state_incorporation.as_deref(),
                    None,
                )
                .await?;
        }

        let filing = self
            .catalogue
            .create_filing(
                NewFiling {
                    form_type: record.form_type.clone(),
                    accession_number: record.accession_number.clone(),
                    date_filed: record.date_filed.as_deref().and_then(parse_compact_date),
                    company_id: Some(company.id),
                    sha1: Some(sha1_hex(&bytes)),
                    store_path: store_path.to_string(),
                    document_count: record.document_count.map(|c| c as i64),
                },
                false,
                true,
            )
            .await?;

        for document in &record.documents {
            let extracted_text = if store_text {
                self.text_extractor.extract(&document.content).await?
            } else {
                None
            };

            let new_document = NewFilingDocument {
                filing_id: filing.id,
                sequence: document.sequence.unwrap_or(0) as i64,
                doc_type: document.doc_type.clone(),
                file_name: document.file_name.clone(),
                content_type: Some(document.content_type.clone()),
                description: document.description.clone(),
                sha1: Some(document.sha1.clone()),
                start_pos: document.start_pos as i64,
                end_pos: document.end_pos as i64,
            };
            let persisted = self.catalogue.create_filing_document(new_document).await?;

            if store_raw {
                let raw_path = format!("raw/{}", document.sha1);
                if !self.blob_store.exists(&raw_path).await? {
                    self.blob_store.put(&raw_path, document.content.clone(), true).await?;
                }
            }
            if store_text {
                if let Some(text) = &extracted_text {
                    let text_path = format!("text/{}", document.sha1);
                    if !self.blob_store.exists(&text_path).await? {
                        self.blob_store
                            .put(&text_path, text.clone().into_bytes(), true)
                            .await?;
                    }
                }
            }

            // is_error iff no content bytes were recovered for this document.
            self.catalogue
                .mark_filing_document_processed(persisted.id, true, document.content.is_empty())
                .await?;
        }

        self.catalogue.mark_filing_processed(filing.id, true, false).await?;
        Ok(true)
    }

    /// `search_document`: counts substring occurrences of each term in the
    /// document's extracted text, optionally case-folding, tokenising, or stemming both
    /// sides first, and persists a result only for terms with count > 0.
    pub async fn search_document(
        &self,
        sha1: &str,
        terms: &[String],
        query_id: i64,
        document_id: i64,
        case_sensitive: bool,
        token: bool,
        stem: bool,
    ) -> Result<()> {
        let text_path = format!("text/{sha1}");
        if !self.blob_store.exists(&text_path).await? {
            return Ok(());
        }
        let bytes = self.blob_store.get(&text_path, true).await?;
        let document_text = String::from_utf8_lossy(&bytes).into_owned();

        let project = |s: &str| -> String {
            let mut out = if case_sensitive { s.to_string() } else { s.to_lowercase() };
            if token {
                out = tokenize(&out).join(" ");
            }
            if stem {
                out = out.split(' ').map(naive_stem).collect::<Vec<_>>().join(" ");
            }
            out
        };

        let projected_document = project(&document_text);

        for term in terms {
            let projected_term = project(term);
            if projected_term.is_empty() {
                continue;
            }
            let count = projected_document.matches(&projected_term).count() as i64;
            if count > 0 {
                let term_row = self.catalogue.get_or_create_search_query_term(query_id, term).await?;
                self.catalogue
                    .record_search_query_result(query_id, document_id, term_row.id, count)
                    .await?;
            }
        }

        Ok(())
    }

    /// `extract_document_data`: the minimal downstream-extraction hook. Confirms
    /// the document's text artifact exists and returns; writes no new catalogue rows,
    /// since structured extraction itself is out of scope.
    pub async fn extract_document_data(&self, sha1: &str, document_id: i64) -> Result<()> {
        let text_path = format!("text/{sha1}");
        let exists = self.blob_store.exists(&text_path).await?;
        tracing::debug!(document_id, sha1, exists, "extract_document_data invoked");
        Ok(())
    }

    async fn dispatch(&self, task: Task) -> Result<()> {
        match task {
            Task::ProcessFilingIndex {
                file_path,
                form_type_filter,
                store_raw,
                store_text,
            } => {
                self.process_filing_index(&file_path, form_type_filter.as_deref(), store_raw, store_text)
                    .await
            }
            Task::ProcessFiling {
                store_path,
                envelope_bytes,
                store_raw,
                store_text,
            } => self
                .process_filing(&store_path, envelope_bytes, store_raw, store_text)
                .await
                .map(|_| ()),
            Task::SearchDocument {
                sha1,
                terms,
                query_id,
                document_id,
                case_sensitive,
                token,
                stem,
            } => {
                self.search_document(&sha1, &terms, query_id, document_id, case_sensitive, token, stem)
                    .await
            }
            Task::ExtractDocumentData { sha1, document_id } => {
                self.extract_document_data(&sha1, document_id).await
            }
        }
    }

    /// `create_filing_error`: records a minimal Filing row, company stub
    /// included, with `is_error=true, is_processed=false`.
    async fn create_filing_error(&self, cik: u64, company_name: &str, filing_path: &str) -> Result<()> {
        let company = self.catalogue.get_or_create_company(cik, company_name).await?;
        self.catalogue
            .create_filing(
                NewFiling {
                    form_type: None,
                    accession_number: None,
                    date_filed: None,
                    company_id: Some(company.id),
                    sha1: None,
                    store_path: filing_path.to_string(),
                    document_count: None,
                },
                false,
                true,
            )
            .await?;
        Ok(())
    }

    /// Resolves `path` against the blob store first (mirror hit), falling back to EDGAR
    /// and mirroring the result verbatim under `edgar/full-index/…` or `edgar/data/…`.
    async fn fetch_or_cached(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let key = to_blob_key(path);
        if self.blob_store.exists(&key).await? {
            return Ok(Some(self.blob_store.get(&key, false).await?));
        }
        let (bytes, _) = self.edgar.get_buffer(&to_archive_path(&key)).await?;
        if let Some(bytes) = &bytes {
            self.blob_store.put(&key, bytes.clone(), false).await?;
        }
        Ok(bytes)
    }
}

/// Pulls tasks from a [`TaskQueue`] and dispatches to [`TaskHandlers`] by variant.
pub struct Worker {
    queue: Arc<dyn TaskQueue>,
    handlers: Arc<TaskHandlers>,
}

impl Worker {
    pub fn new(queue: Arc<dyn TaskQueue>, handlers: Arc<TaskHandlers>) -> Self {
        Self { queue, handlers }
    }

    /// Runs until the queue is observed empty once; a long-lived deployment wraps this
    /// in its own polling loop (the queue abstraction is deliberately silent on backoff).
    pub async fn drain(&self) -> Result<usize> {
        let mut processed = 0usize;
        while let Some(task) = self.queue.try_dequeue().await {
            if let Err(e) = self.handlers.dispatch(task).await {
                tracing::warn!("task failed: {e}");
            }
            processed += 1;
        }
        Ok(processed)
    }
}

fn parse_compact_date(raw: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}

fn tokenize(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// A deliberately minimal suffix-stripping stemmer: the NLP tokeniser used for search is
/// an external collaborator out of scope for this crate; this local normalisation
/// only needs to be consistent between the term and document projections.
fn naive_stem(word: &str) -> String {
    for suffix in ["ing", "edly", "ed", "ly", "es", "s"] {
        if word.len() > suffix.len() + 2 {
            if let Some(stripped) = word.strip_suffix(suffix) {
                return stripped.to_string();
            }
        }
    }
    word.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_queue_is_fifo() {
        let queue = InMemoryTaskQueue::new();
        queue
            .enqueue(Task::ExtractDocumentData {
                sha1: "a".to_string(),
                document_id: 1,
            })
            .await
            .unwrap();
        queue
            .enqueue(Task::ExtractDocumentData {
                sha1: "b".to_string(),
                document_id: 2,
            })
            .await
            .unwrap();

        let first = queue.try_dequeue().await.unwrap();
        match first {
            Task::ExtractDocumentData { sha1, .. } => assert_eq!(sha1, "a"),
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn tokenize_splits_on_punctuation() {
        assert_eq!(tokenize("hello, world!"), vec!["hello", "world"]);
    }

    #[test]
    fn naive_stem_strips_common_suffixes() {
        assert_eq!(naive_stem("filings"), "filing");
        assert_eq!(naive_stem("filed"), "fil");
    }
}

//! The relational catalogue: persistent entities plus a `CatalogueStore` trait
//! that keeps the SQL engine swappable. Production runs against [`PgCatalogueStore`]
//! (Postgres via `sqlx::PgPool`); unit tests exercise the same trait against
//! [`InMemoryCatalogueStore`] without a live database.
//!
//! Every idempotency key is enforced by a unique constraint in `migrations/`;
//! every create method here recovers from a lost race by re-reading the winning row
//! rather than propagating the conflict.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;
use sqlx::Row;
use std::collections::HashMap;
use std::sync::Mutex;

use super::error::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Company {
    pub id: i64,
    pub cik: u64,
    pub last_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyInfo {
    pub id: i64,
    pub company_id: i64,
    pub date: NaiveDate,
    pub name: String,
    pub sic: Option<String>,
    pub state_location: Option<String>,
    pub state_incorporation: Option<String>,
    pub business_address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingIndex {
    pub url: String,
    pub date_published: Option<NaiveDate>,
    pub date_downloaded: Option<NaiveDate>,
    pub total_record_count: i64,
    pub bad_record_count: i64,
    pub is_processed: bool,
    pub is_error: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filing {
    pub id: i64,
    pub form_type: Option<String>,
    pub accession_number: Option<String>,
    pub date_filed: Option<NaiveDate>,
    pub company_id: Option<i64>,
    pub sha1: Option<String>,
    pub store_path: String,
    pub document_count: Option<i64>,
    pub is_processed: bool,
    pub is_error: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewFiling {
    pub form_type: Option<String>,
    pub accession_number: Option<String>,
    pub date_filed: Option<NaiveDate>,
    pub company_id: Option<i64>,
    pub sha1: Option<String>,
    pub store_path: String,
    pub document_count: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingDocument {
    pub id: i64,
    pub filing_id: i64,
    pub sequence: i64,
    pub doc_type: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub sha1: Option<String>,
    pub start_pos: i64,
    pub end_pos: i64,
    pub is_processed: bool,
    pub is_error: bool,
}

#[derive(Debug, Clone, Default)]
pub struct NewFilingDocument {
    pub filing_id: i64,
    pub sequence: i64,
    pub doc_type: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub sha1: Option<String>,
    pub start_pos: i64,
    pub end_pos: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub id: i64,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQueryTerm {
    pub id: i64,
    pub query_id: i64,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQueryResult {
    pub id: i64,
    pub query_id: i64,
    pub document_id: i64,
    pub term_id: i64,
    pub count: i64,
}

/// Persistence seam for the catalogue. Every create/upsert method is idempotent
/// on the entity's key; a concurrent create that loses the race observes the winner's
/// row rather than erroring.
#[async_trait]
pub trait CatalogueStore: Send + Sync {
    async fn get_or_create_company(&self, cik: u64, name: &str) -> Result<Company>;

    #[allow(clippy::too_many_arguments)]
    async fn get_or_create_company_info(
        &self,
        company_id: i64,
        date: NaiveDate,
        name: &str,
        sic: Option<&str>,
        state_location: Option<&str>,
        state_incorporation: Option<&str>,
        business_address: Option<&str>,
    ) -> Result<CompanyInfo>;

    /// All Filing rows at `store_path` — empty if none exist, more than one if an
    /// ambiguity has crept in (never repaired silently here).
    async fn filings_at_store_path(&self, store_path: &str) -> Result<Vec<Filing>>;

    async fn create_filing(&self, new: NewFiling, is_processed: bool, is_error: bool) -> Result<Filing>;

    async fn mark_filing_processed(&self, id: i64, is_processed: bool, is_error: bool) -> Result<()>;

    async fn create_filing_document(&self, new: NewFilingDocument) -> Result<FilingDocument>;

    async fn mark_filing_document_processed(&self, id: i64, is_processed: bool, is_error: bool) -> Result<()>;

    async fn documents_for_filing(&self, filing_id: i64) -> Result<Vec<FilingDocument>>;

    #[allow(clippy::too_many_arguments)]
    async fn upsert_filing_index(
        &self,
        url: &str,
        date_published: Option<NaiveDate>,
        total_record_count: i64,
        bad_record_count: i64,
        is_processed: bool,
        is_error: bool,
        date_downloaded: Option<NaiveDate>,
    ) -> Result<FilingIndex>;

    async fn get_or_create_search_query(&self, name: Option<&str>) -> Result<SearchQuery>;

    async fn get_or_create_search_query_term(&self, query_id: i64, term: &str) -> Result<SearchQueryTerm>;

    async fn record_search_query_result(
        &self,
        query_id: i64,
        document_id: i64,
        term_id: i64,
        count: i64,
    ) -> Result<()>;
}

/// `sqlx`-backed implementation against Postgres. Issues
/// `INSERT ... ON CONFLICT DO NOTHING` followed by a `SELECT` on the idempotency key,
/// or a single `INSERT ... ON CONFLICT ... RETURNING` where the conflict target matches
/// the key exactly — the relational analogue of "recover by re-reading the existing row".
pub struct PgCatalogueStore {
    pool: PgPool,
}

impl PgCatalogueStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the catalogue schema migrations bundled under `migrations/` against a fresh
    /// pool. An operator's responsibility; exposed here for convenience.
    pub async fn migrate(pool: &PgPool) -> Result<()> {
        sqlx::migrate!("./migrations").run(pool).await?;
        Ok(())
    }
}

#[async_trait]
impl CatalogueStore for PgCatalogueStore {
    async fn get_or_create_company(&self, cik: u64, name: &str) -> Result<Company> {
        let cik_i64 = cik as i64;
        let row = sqlx::query(
            "INSERT INTO companies (cik, last_name) VALUES ($1, $2) \
             ON CONFLICT (cik) DO UPDATE SET cik = companies.cik \
             RETURNING id, cik, last_name",
        )
        .bind(cik_i64)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(Company {
            id: row.get("id"),
            cik: row.get::<i64, _>("cik") as u64,
            last_name: row.get("last_name"),
        })
    }

    async fn get_or_create_company_info(
        &self,
        company_id: i64,
        date: NaiveDate,
        name: &str,
        sic: Option<&str>,
        state_location: Option<&str>,
        state_incorporation: Option<&str>,
        business_address: Option<&str>,
    ) -> Result<CompanyInfo> {
        let row = sqlx::query(
            "INSERT INTO company_infos \
             (company_id, date, name, sic, state_location, state_incorporation, business_address) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (company_id, date) DO UPDATE SET company_id = company_infos.company_id \
             RETURNING id, company_id, date, name, sic, state_location, state_incorporation, business_address",
        )
        .bind(company_id)
        .bind(date)
        .bind(name)
        .bind(sic)
        .bind(state_location)
        .bind(state_incorporation)
        .bind(business_address)
        .fetch_one(&self.pool)
        .await?;

        Ok(CompanyInfo {
            id: row.get("id"),
            company_id: row.get("company_id"),
            date: row.get("date"),
            name: row.get("name"),
            sic: row.get("sic"),
            state_location: row.get("state_location"),
            state_incorporation: row.get("state_incorporation"),
            business_address: row.get("business_address"),
        })
    }

    async fn filings_at_store_path(&self, store_path: &str) -> Result<Vec<Filing>> {
        let rows = sqlx::query(
            "SELECT id, form_type, accession_number, date_filed, company_id, sha1, store_path, \
             document_count, is_processed, is_error FROM filings WHERE store_path = $1",
        )
        .bind(store_path)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_filing).collect())
    }

    async fn create_filing(&self, new: NewFiling, is_processed: bool, is_error: bool) -> Result<Filing> {
        let row = sqlx::query(
            "INSERT INTO filings \
             (form_type, accession_number, date_filed, company_id, sha1, store_path, document_count, is_processed, is_error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (store_path) DO UPDATE SET store_path = filings.store_path \
             RETURNING id, form_type, accession_number, date_filed, company_id, sha1, store_path, \
             document_count, is_processed, is_error",
        )
        .bind(&new.form_type)
        .bind(&new.accession_number)
        .bind(new.date_filed)
        .bind(new.company_id)
        .bind(&new.sha1)
        .bind(&new.store_path)
        .bind(new.document_count)
        .bind(is_processed)
        .bind(is_error)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_filing(row))
    }

    async fn mark_filing_processed(&self, id: i64, is_processed: bool, is_error: bool) -> Result<()> {
        sqlx::query("UPDATE filings SET is_processed = $1, is_error = $2 WHERE id = $3")
            .bind(is_processed)
            .bind(is_error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_filing_document(&self, new: NewFilingDocument) -> Result<FilingDocument> {
        let row = sqlx::query(
            "INSERT INTO filing_documents \
             (filing_id, sequence, doc_type, file_name, content_type, description, sha1, start_pos, end_pos, is_processed, is_error) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, false, false) \
             ON CONFLICT (filing_id, sequence) DO UPDATE SET filing_id = filing_documents.filing_id \
             RETURNING id, filing_id, sequence, doc_type, file_name, content_type, description, sha1, \
             start_pos, end_pos, is_processed, is_error",
        )
        .bind(new.filing_id)
        .bind(new.sequence)
        .bind(&new.doc_type)
        .bind(&new.file_name)
        .bind(&new.content_type)
        .bind(&new.description)
        .bind(&new.sha1)
        .bind(new.start_pos)
        .bind(new.end_pos)
        .fetch_one(&self.pool)
        .await?;
        Ok(row_to_document(row))
    }

    async fn mark_filing_document_processed(&self, id: i64, is_processed: bool, is_error: bool) -> Result<()> {
        sqlx::query("UPDATE filing_documents SET is_processed = $1, is_error = $2 WHERE id = $3")
            .bind(is_processed)
            .bind(is_error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn documents_for_filing(&self, filing_id: i64) -> Result<Vec<FilingDocument>> {
        let rows = sqlx::query(
            "SELECT id, filing_id, sequence, doc_type, file_name, content_type, description, sha1, \
             start_pos, end_pos, is_processed, is_error FROM filing_documents WHERE filing_id = $1 ORDER BY sequence",
        )
        .bind(filing_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_document).collect())
    }

    async fn upsert_filing_index(
        &self,
        url: &str,
        date_published: Option<NaiveDate>,
        total_record_count: i64,
        bad_record_count: i64,
        is_processed: bool,
        is_error: bool,
        date_downloaded: Option<NaiveDate>,
    ) -> Result<FilingIndex> {
        let row = sqlx::query(
            "INSERT INTO filing_indexes \
             (url, date_published, total_record_count, bad_record_count, is_processed, is_error, date_downloaded) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (url) DO UPDATE SET \
               total_record_count = excluded.total_record_count, \
               bad_record_count = excluded.bad_record_count, \
               is_processed = excluded.is_processed, \
               is_error = excluded.is_error, \
               date_downloaded = excluded.date_downloaded \
             RETURNING url, date_published, date_downloaded, total_record_count, bad_record_count, is_processed, is_error",
        )
        .bind(url)
        .bind(date_published)
        .bind(total_record_count)
        .bind(bad_record_count)
        .bind(is_processed)
        .bind(is_error)
        .bind(date_downloaded)
        .fetch_one(&self.pool)
        .await?;

        Ok(FilingIndex {
            url: row.get("url"),
            date_published: row.get("date_published"),
            date_downloaded: row.get("date_downloaded"),
            total_record_count: row.get("total_record_count"),
            bad_record_count: row.get("bad_record_count"),
            is_processed: row.get("is_processed"),
            is_error: row.get("is_error"),
        })
    }

    async fn get_or_create_search_query(&self, name: Option<&str>) -> Result<SearchQuery> {
        let row = sqlx::query("INSERT INTO search_queries (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(SearchQuery {
            id: row.get("id"),
            name: row.get("name"),
        })
    }

    async fn get_or_create_search_query_term(&self, query_id: i64, term: &str) -> Result<SearchQueryTerm> {
        let row = sqlx::query(
            "INSERT INTO search_query_terms (query_id, term) VALUES ($1, $2) \
             ON CONFLICT (query_id, term) DO UPDATE SET query_id = search_query_terms.query_id \
             RETURNING id, query_id, term",
        )
        .bind(query_id)
        .bind(term)
        .fetch_one(&self.pool)
        .await?;
        Ok(SearchQueryTerm {
            id: row.get("id"),
            query_id: row.get("query_id"),
            term: row.get("term"),
        })
    }

    async fn record_search_query_result(
        &self,
        query_id: i64,
        document_id: i64,
        term_id: i64,
        count: i64,
    ) -> Result<()> {
        if count <= 0 {
            return Ok(());
        }
        sqlx::query(
            "INSERT INTO search_query_results (query_id, document_id, term_id, count) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (query_id, document_id, term_id) DO UPDATE SET count = excluded.count",
        )
        .bind(query_id)
        .bind(document_id)
        .bind(term_id)
        .bind(count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_filing(row: sqlx::postgres::PgRow) -> Filing {
    Filing {
        id: row.get("id"),
        form_type: row.get("form_type"),
        accession_number: row.get("accession_number"),
        date_filed: row.get("date_filed"),
        company_id: row.get("company_id"),
        sha1: row.get("sha1"),
        store_path: row.get("store_path"),
        document_count: row.get("document_count"),
        is_processed: row.get("is_processed"),
        is_error: row.get("is_error"),
    }
}

fn row_to_document(row: sqlx::postgres::PgRow) -> FilingDocument {
    FilingDocument {
        id: row.get("id"),
        filing_id: row.get("filing_id"),
        sequence: row.get("sequence"),
        doc_type: row.get("doc_type"),
        file_name: row.get("file_name"),
        content_type: row.get("content_type"),
        description: row.get("description"),
        sha1: row.get("sha1"),
        start_pos: row.get("start_pos"),
        end_pos: row.get("end_pos"),
        is_processed: row.get("is_processed"),
        is_error: row.get("is_error"),
    }
}

/// In-memory implementation used by unit tests and single-process smoke runs, so
/// `CatalogueStore` call sites never need a live database to exercise idempotency
/// behaviour.
#[derive(Default)]
pub struct InMemoryCatalogueStore {
    inner: Mutex<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    next_id: i64,
    companies: HashMap<u64, Company>,
    company_infos: HashMap<(i64, NaiveDate), CompanyInfo>,
    filings: HashMap<String, Filing>,
    filing_documents: HashMap<(i64, i64), FilingDocument>,
    filing_indexes: HashMap<String, FilingIndex>,
    search_queries: Vec<SearchQuery>,
    search_query_terms: HashMap<(i64, String), SearchQueryTerm>,
    search_query_results: HashMap<(i64, i64, i64), SearchQueryResult>,
}

impl InMemoryState {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl InMemoryCatalogueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogueStore for InMemoryCatalogueStore {
    async fn get_or_create_company(&self, cik: u64, name: &str) -> Result<Company> {
        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state.companies.get(&cik) {
            return Ok(existing.clone());
        }
        let id = state.alloc_id();
        let company = Company {
            id,
            cik,
            last_name: name.to_string(),
        };
        state.companies.insert(cik, company.clone());
        Ok(company)
    }

    async fn get_or_create_company_info(
        &self,
        company_id: i64,
        date: NaiveDate,
        name: &str,
        sic: Option<&str>,
        state_location: Option<&str>,
        state_incorporation: Option<&str>,
        business_address: Option<&str>,
    ) -> Result<CompanyInfo> {
        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state.company_infos.get(&(company_id, date)) {
            return Ok(existing.clone());
        }
        let id = state.alloc_id();
        let info = CompanyInfo {
            id,
            company_id,
            date,
            name: name.to_string(),
            sic: sic.map(str::to_string),
            state_location: state_location.map(str::to_string),
            state_incorporation: state_incorporation.map(str::to_string),
            business_address: business_address.map(str::to_string),
        };
        state.company_infos.insert((company_id, date), info.clone());
        Ok(info)
    }

    async fn filings_at_store_path(&self, store_path: &str) -> Result<Vec<Filing>> {
        let state = self.inner.lock().unwrap();
        Ok(state.filings.get(store_path).cloned().into_iter().collect())
    }

    async fn create_filing(&self, new: NewFiling, is_processed: bool, is_error: bool) -> Result<Filing> {
        let mut state = self.inner.lock().unwrap();
        if let Some(existing) = state.filings.get(&new.store_path) {
            return Ok(existing.clone());
        }
        let id = state.alloc_id();
        let filing = Filing {
            id,
            form_type: new.form_type,
            accession_number: new.accession_number,
            date_filed: new.date_filed,
            company_id: new.company_id,
            sha1: new.sha1,
            store_path: new.store_path.clone(),
            document_count: new.document_count,
            is_processed,
            is_error,
        };
        state.filings.insert(new.store_path, filing.clone());
        Ok(filing)
    }

    async fn mark_filing_processed(&self, id: i64, is_processed: bool, is_error: bool) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(filing) = state.filings.values_mut().find(|f| f.id == id) {
            filing.is_processed = is_processed;
            filing.is_error = is_error;
        }
        Ok(())
    }

    async fn create_filing_document(&self, new: NewFilingDocument) -> Result<FilingDocument> {
        let mut state = self.inner.lock().unwrap();
        let key = (new.filing_id, new.sequence);
        if let Some(existing) = state.filing_documents.get(&key) {
            return Ok(existing.clone());
        }
        let id = state.alloc_id();
        let doc = FilingDocument {
            id,
            filing_id: new.filing_id,
            sequence: new.sequence,
            doc_type: new.doc_type,
            file_name: new.file_name,
            content_type: new.content_type,
            description: new.description,
            sha1: new.sha1,
            start_pos: new.start_pos,
            end_pos: new.end_pos,
            is_processed: false,
            is_error: false,
        };
        state.filing_documents.insert(key, doc.clone());
        Ok(doc)
    }

    async fn mark_filing_document_processed(&self, id: i64, is_processed: bool, is_error: bool) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        if let Some(doc) = state.filing_documents.values_mut().find(|d| d.id == id) {
            doc.is_processed = is_processed;
            doc.is_error = is_error;
        }
        Ok(())
    }

    async fn documents_for_filing(&self, filing_id: i64) -> Result<Vec<FilingDocument>> {
        let state = self.inner.lock().unwrap();
        let mut docs: Vec<FilingDocument> = state
            .filing_documents
            .values()
            .filter(|d| d.filing_id == filing_id)
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.sequence);
        Ok(docs)
    }

    async fn upsert_filing_index(
        &self,
        url: &str,
        date_published: Option<NaiveDate>,
        total_record_count: i64,
        bad_record_count: i64,
        is_processed: bool,
        is_error: bool,
        date_downloaded: Option<NaiveDate>,
    ) -> Result<FilingIndex> {
        let mut state = self.inner.lock().unwrap();
        let entry = FilingIndex {
            url: url.to_string(),
            date_published,
            date_downloaded,
            total_record_count,
            bad_record_count,
            is_processed,
            is_error,
        };
        state.filing_indexes.insert(url.to_string(), entry.clone());
        Ok(entry)
    }

    async fn get_or_create_search_query(&self, name: Option<&str>) -> Result<SearchQuery> {
        let mut state = self.inner.lock().unwrap();
        let id = state.alloc_id();
        let query = SearchQuery {
            id,
            name: name.map(str::to_string),
        };
        state.search_queries.push(query.clone());
        Ok(query)
    }

    async fn get_or_create_search_query_term(&self, query_id: i64, term: &str) -> Result<SearchQueryTerm> {
        let mut state = self.inner.lock().unwrap();
        let key = (query_id, term.to_string());
        if let Some(existing) = state.search_query_terms.get(&key) {
            return Ok(existing.clone());
        }
        let id = state.alloc_id();
        let record = SearchQueryTerm {
            id,
            query_id,
            term: term.to_string(),
        };
        state.search_query_terms.insert(key, record.clone());
        Ok(record)
    }

    async fn record_search_query_result(
        &self,
        query_id: i64,
        document_id: i64,
        term_id: i64,
        count: i64,
    ) -> Result<()> {
        if count <= 0 {
            return Ok(());
        }
        let mut state = self.inner.lock().unwrap();
        let id = state.alloc_id();
        state.search_query_results.insert(
            (query_id, document_id, term_id),
            SearchQueryResult {
                id,
                query_id,
                document_id,
                term_id,
                count,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_company_is_idempotent_on_cik() {
        let store = InMemoryCatalogueStore::new();
        let a = store.get_or_create_company(320193, "APPLE INC").await.unwrap();
        let b = store.get_or_create_company(320193, "APPLE INC").await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn at_most_one_company_info_per_company_and_date() {
        let store = InMemoryCatalogueStore::new();
        let company = store.get_or_create_company(1, "X").await.unwrap();
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let a = store
            .get_or_create_company_info(company.id, date, "X", None, None, None, None)
            .await
            .unwrap();
        let b = store
            .get_or_create_company_info(company.id, date, "X RENAMED", None, None, None, None)
            .await
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.name, "X"); // first observation wins; never mutated
    }

    #[tokio::test]
    async fn create_filing_is_idempotent_on_store_path() {
        let store = InMemoryCatalogueStore::new();
        let new = NewFiling {
            store_path: "edgar/data/1/a.txt".to_string(),
            ..Default::default()
        };
        let a = store.create_filing(new.clone(), false, true).await.unwrap();
        let b = store.create_filing(new, true, false).await.unwrap();
        assert_eq!(a.id, b.id);
        assert!(!b.is_processed); // b observes a's persisted state, not its own args
    }

    #[tokio::test]
    async fn filing_document_unique_on_filing_and_sequence() {
        let store = InMemoryCatalogueStore::new();
        let filing = store
            .create_filing(
                NewFiling {
                    store_path: "edgar/data/1/a.txt".to_string(),
                    ..Default::default()
                },
                false,
                true,
            )
            .await
            .unwrap();
        let new = NewFilingDocument {
            filing_id: filing.id,
            sequence: 1,
            start_pos: 0,
            end_pos: 10,
            ..Default::default()
        };
        let a = store.create_filing_document(new.clone()).await.unwrap();
        let b = store.create_filing_document(new).await.unwrap();
        assert_eq!(a.id, b.id);
    }

    #[tokio::test]
    async fn documents_for_filing_returns_in_sequence_order() {
        let store = InMemoryCatalogueStore::new();
        let filing = store
            .create_filing(
                NewFiling {
                    store_path: "edgar/data/1/a.txt".to_string(),
                    ..Default::default()
                },
                false,
                true,
            )
            .await
            .unwrap();
        for seq in [2, 1, 3] {
            store
                .create_filing_document(NewFilingDocument {
                    filing_id: filing.id,
                    sequence: seq,
                    start_pos: 0,
                    end_pos: 1,
                    ..Default::default()
                })
                .await
                .unwrap();
        }
        let docs = store.documents_for_filing(filing.id).await.unwrap();
        assert_eq!(docs.iter().map(|d| d.sequence).collect::<Vec<_>>(), vec![1, 2, 3]);
    }
}

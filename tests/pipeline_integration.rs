mod common;

use std::sync::Arc;

use edgar_ingest::blob_store::{BlobStore, ObjectStoreBlobStore};
use edgar_ingest::catalogue::{CatalogueStore, InMemoryCatalogueStore};
use edgar_ingest::config::BlobStoreConfig;
use edgar_ingest::tasks::TaskHandlers;
use edgar_ingest::text_extractor::NullTextExtractor;

const SAMPLE_ENVELOPE: &str = "\
<SEC-DOCUMENT>0000007323-94-000018.txt : 19940930\n\
<SEC-HEADER>0000007323-94-000018.hdr.sgml : 19940930\n\
ACCESSION NUMBER:\t\t0000007323-94-000018\n\
CONFORMED SUBMISSION TYPE:\t10-K\n\
PUBLIC DOCUMENT COUNT:\t\t1\n\
CONFORMED PERIOD OF REPORT:\t19940630\n\
FILED AS OF DATE:\t\t19940930\n\
\n\
COMPANY CONFORMED NAME:\t\tARKANSAS POWER & LIGHT CO\n\
CENTRAL INDEX KEY:\t\t0000007323\n\
STANDARD INDUSTRIAL CLASSIFICATION:\t4911\n\
IRS NUMBER:\t\t\t710005660\n\
STATE OF INCORPORATION:\t\tAR\n\
STATE:\t\t\t\tAR\n\
</SEC-HEADER>\n\
<DOCUMENT>\n\
<TYPE>10-K\n\
<SEQUENCE>1\n\
<FILENAME>0000007323-94-000018.txt\n\
<TEXT>\n\
Some plain text filing body mentioning Arkansas twice: Arkansas.\n\
</TEXT>\n\
</DOCUMENT>\n\
</SEC-DOCUMENT>\n";

async fn local_blob_store() -> (Arc<ObjectStoreBlobStore>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config = BlobStoreConfig::Local {
        root: dir.path().to_path_buf(),
    };
    let store = ObjectStoreBlobStore::new(&config, 6).await.unwrap();
    (Arc::new(store), dir)
}

fn handlers(blob_store: Arc<ObjectStoreBlobStore>, catalogue: Arc<InMemoryCatalogueStore>) -> TaskHandlers {
    TaskHandlers {
        blob_store,
        catalogue,
        edgar: common::edgar(),
        text_extractor: Arc::new(NullTextExtractor),
        queue: None,
    }
}

#[tokio::test]
async fn process_filing_persists_company_filing_and_documents() {
    let (blob_store, _dir) = local_blob_store().await;
    let catalogue = Arc::new(InMemoryCatalogueStore::new());
    let handlers = handlers(blob_store.clone(), catalogue.clone());

    handlers
        .process_filing(
            "/Archives/edgar/data/7323/0000007323-94-000018.txt",
            Some(SAMPLE_ENVELOPE.as_bytes().to_vec()),
            true,
            true,
        )
        .await
        .unwrap();

    let filings = catalogue
        .filings_at_store_path("/Archives/edgar/data/7323/0000007323-94-000018.txt")
        .await
        .unwrap();
    assert_eq!(filings.len(), 1);
    let filing = &filings[0];
    assert_eq!(filing.form_type.as_deref(), Some("10-K"));
    assert!(filing.is_processed);
    assert!(!filing.is_error);

    let documents = catalogue.documents_for_filing(filing.id).await.unwrap();
    assert_eq!(documents.len(), 1);
    assert!(!documents[0].is_error, "non-empty document content must not be flagged as an error");

    let raw_path = format!("raw/{}", documents[0].sha1.as_deref().unwrap());
    assert!(blob_store.exists(&raw_path).await.unwrap());
}

#[tokio::test]
async fn process_filing_is_idempotent_on_store_path() {
    let (blob_store, _dir) = local_blob_store().await;
    let catalogue = Arc::new(InMemoryCatalogueStore::new());
    let handlers = handlers(blob_store, catalogue.clone());

    for _ in 0..2 {
        handlers
            .process_filing(
                "/Archives/edgar/data/7323/0000007323-94-000018.txt",
                Some(SAMPLE_ENVELOPE.as_bytes().to_vec()),
                true,
                true,
            )
            .await
            .unwrap();
    }

    let filings = catalogue
        .filings_at_store_path("/Archives/edgar/data/7323/0000007323-94-000018.txt")
        .await
        .unwrap();
    assert_eq!(filings.len(), 1, "second run must not duplicate the Filing row");
}

#[tokio::test]
async fn search_document_counts_term_occurrences_in_extracted_text() {
    let (blob_store, _dir) = local_blob_store().await;
    let catalogue = Arc::new(InMemoryCatalogueStore::new());
    let handlers = handlers(blob_store.clone(), catalogue.clone());

    let sha1 = "deadbeefcafef00dfacefeedaa0102030405beef";
    blob_store
        .put(
            &format!("text/{sha1}"),
            b"arkansas power and light filed a 10-K about arkansas".to_vec(),
            true,
        )
        .await
        .unwrap();

    let query = catalogue.get_or_create_search_query(Some("arkansas-scan")).await.unwrap();
    let company = catalogue.get_or_create_company(7323, "ARKANSAS POWER & LIGHT CO").await.unwrap();
    let filing = catalogue
        .create_filing(
            edgar_ingest::catalogue::NewFiling {
                form_type: Some("10-K".to_string()),
                accession_number: None,
                date_filed: None,
                company_id: Some(company.id),
                sha1: None,
                store_path: "/Archives/edgar/data/7323/doc.txt".to_string(),
                document_count: Some(1),
            },
            true,
            false,
        )
        .await
        .unwrap();
    let document = catalogue
        .create_filing_document(edgar_ingest::catalogue::NewFilingDocument {
            filing_id: filing.id,
            sequence: 1,
            doc_type: Some("10-K".to_string()),
            file_name: None,
            content_type: Some("text/plain".to_string()),
            description: None,
            sha1: Some(sha1.to_string()),
            start_pos: 0,
            end_pos: 10,
        })
        .await
        .unwrap();

    handlers
        .search_document(sha1, &["arkansas".to_string()], query.id, document.id, false, false, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn process_filing_index_dispatches_inline_without_a_queue() {
    let (blob_store, _dir) = local_blob_store().await;
    let catalogue = Arc::new(InMemoryCatalogueStore::new());
    let handlers = handlers(blob_store.clone(), catalogue.clone());

    let index_text = "\
Description:           Form Index of EDGAR Dissemination Feed\n\
Last Data Received:    September 30, 1994\n\
\n\
Form Type   Company Name                                                  CIK         Date Filed  File Name\n\
----------- ------------------------------------------------------------  ----------  ----------  ------------------------------------\n\
10-K        ARKANSAS POWER & LIGHT CO                                     7323        1994-09-30  edgar/data/7323/0000007323-94-000018.txt\n\
";

    let index_path = "edgar/full-index/1994/QTR3/form.idx";
    blob_store.put(index_path, index_text.as_bytes().to_vec(), false).await.unwrap();
    blob_store
        .put(
            "edgar/data/7323/0000007323-94-000018.txt",
            SAMPLE_ENVELOPE.as_bytes().to_vec(),
            false,
        )
        .await
        .unwrap();

    handlers
        .process_filing_index(index_path, None, true, true)
        .await
        .unwrap();

    let filings = catalogue
        .filings_at_store_path("edgar/data/7323/0000007323-94-000018.txt")
        .await
        .unwrap();
    assert_eq!(filings.len(), 1);
}

#[tokio::test]
async fn process_filing_index_counts_bad_records_and_creates_error_filing() {
    let (blob_store, _dir) = local_blob_store().await;
    let catalogue = Arc::new(InMemoryCatalogueStore::new());
    let handlers = handlers(blob_store.clone(), catalogue.clone());

    let index_text = "\
Description:           Form Index of EDGAR Dissemination Feed\n\
Last Data Received:    September 30, 1994\n\
\n\
Form Type   Company Name                                                  CIK         Date Filed  File Name\n\
----------- ------------------------------------------------------------  ----------  ----------  ------------------------------------\n\
10-K        HEADERLESS CO                                                  42          1994-09-30  edgar/data/42/0000000042-94-000001.txt\n\
";

    let index_path = "edgar/full-index/1994/QTR3/form.idx";
    blob_store.put(index_path, index_text.as_bytes().to_vec(), false).await.unwrap();
    // No <SEC-HEADER> block, so `process_filing` can't recover a CIK and must
    // report a bad record rather than silently succeeding.
    blob_store
        .put(
            "edgar/data/42/0000000042-94-000001.txt",
            b"<SEC-DOCUMENT>no header here</SEC-DOCUMENT>".to_vec(),
            false,
        )
        .await
        .unwrap();

    handlers
        .process_filing_index(index_path, None, true, true)
        .await
        .unwrap();

    let filings = catalogue
        .filings_at_store_path("edgar/data/42/0000000042-94-000001.txt")
        .await
        .unwrap();
    assert_eq!(filings.len(), 1, "create_filing_error must record a stub Filing row");
    assert!(filings[0].is_error);
    assert!(!filings[0].is_processed);
}

#[tokio::test]
async fn process_filing_does_not_call_text_extractor_when_store_text_is_false() {
    let (blob_store, _dir) = local_blob_store().await;
    let catalogue = Arc::new(InMemoryCatalogueStore::new());
    let handlers = TaskHandlers {
        blob_store: blob_store.clone(),
        catalogue: catalogue.clone(),
        edgar: common::edgar(),
        text_extractor: Arc::new(PanicIfCalledExtractor),
        queue: None,
    };

    handlers
        .process_filing(
            "/Archives/edgar/data/7323/0000007323-94-000018.txt",
            Some(SAMPLE_ENVELOPE.as_bytes().to_vec()),
            true,
            false,
        )
        .await
        .unwrap();

    let filings = catalogue
        .filings_at_store_path("/Archives/edgar/data/7323/0000007323-94-000018.txt")
        .await
        .unwrap();
    assert_eq!(filings.len(), 1);
    assert!(filings[0].sha1.is_some(), "Filing.sha1 must be populated from the envelope bytes");
}

struct PanicIfCalledExtractor;

#[async_trait::async_trait]
impl edgar_ingest::text_extractor::TextExtractor for PanicIfCalledExtractor {
    async fn extract(&self, _bytes: &[u8]) -> edgar_ingest::Result<Option<String>> {
        panic!("text extractor must not run when store_text is false");
    }
}

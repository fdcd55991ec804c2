//! # edgar-ingest — an ingestion pipeline for the SEC EDGAR filing corpus
//!
//! This crate walks EDGAR's hierarchical HTTP index, mirrors raw filings into a
//! pluggable object store, parses each filing's multi-document envelope, extracts
//! per-document text through an external service, and persists a relational
//! catalogue suitable for later full-text search and structured analytics.
//!
//! ## Components
//!
//! - [`blob_store`] — uniform storage over S3, Azure Blob, Azure Data Lake, and the
//!   local filesystem, with optional transparent compression.
//! - [`core`] — the EDGAR HTTP client: directory listing, byte fetching, sentinel-error
//!   recognition, and a bounded retry ladder.
//! - [`index_parser`] — decodes a fixed-width, optionally (double-)gzipped `form.idx`.
//! - [`filing_parser`] — splits a filing envelope into its header and typed `<DOCUMENT>`
//!   sub-sections, uudecoding binary payloads and computing per-document digests.
//! - [`catalogue`] — the relational catalogue's entities and a swappable `CatalogueStore`.
//! - [`tasks`] — the task orchestrator: `process_filing_index`, `process_filing`,
//!   `search_document`, `extract_document_data`, dispatched through a queue abstraction.
//! - [`processes`] — the high-level drivers that reconcile EDGAR's remote listing with
//!   catalogue state and dispatch index tasks.
//! - [`hygiene`] — sweeps that repair or delete known-bad artifacts already in the store.
//! - [`text_extractor`] — the external text-extraction (Tika) boundary.
//! - [`config`] — process-start configuration, read explicitly from the environment.
//!
//! ## Basic usage
//!
//! ```no_run
//! use edgar_ingest::core::Edgar;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let edgar = Edgar::new("edgar-ingest/0.1 contact@example.com")?;
//!     let (bytes, last_modified) = edgar
//!         .get_buffer("/Archives/edgar/data/7323/0000007323-94-000018.txt")
//!         .await?;
//!     println!("{:?} bytes as of {:?}", bytes.map(|b| b.len()), last_modified);
//!     Ok(())
//! }
//! ```

pub mod blob_store;
pub mod catalogue;
pub mod config;
pub mod core;
pub mod error;
pub mod filing_parser;
pub mod hygiene;
pub mod index_parser;
pub mod processes;
pub mod tasks;
pub mod text_extractor;

pub use core::Edgar;
pub use error::{EdgarError, Result};

/// Current crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

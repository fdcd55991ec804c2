//! Error types for the ingestion pipeline.
//!
//! All fallible operations return `Result<T, EdgarError>` where `EdgarError` is an enum
//! covering network errors, HTTP status codes, parsing failures, blob store and catalogue
//! failures, and the EDGAR-specific sentinel bodies the fetcher has to recognise.
//!
//! Errors are designed to be informative, including context like URL previews and HTTP
//! status codes to aid in debugging. The error types use `thiserror` for clean `Display`
//! implementations and proper `Error` trait support.
use std::string::FromUtf8Error;
use thiserror::Error;

/// Comprehensive error type for the ingestion pipeline.
///
/// Errors are categorized by their source: network issues, HTTP status codes, parsing
/// problems, blob store or catalogue failures, or configuration mistakes. Each variant
/// carries enough context to diagnose the failure without re-fetching the resource.
#[derive(Error, Debug)]
pub enum EdgarError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Value conversion error: {0}")]
    ValueConversion(String),

    #[error("String parsing error: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] FromUtf8Error),

    #[error(
        "Unexpected content type from URL {url}. Expected pattern {expected_pattern}, but got Content-Type: {got_content_type}. Content preview: {content_preview}..."
    )]
    UnexpectedContentType {
        url: String,
        expected_pattern: String, // e.g., "application/json"
        got_content_type: String,
        content_preview: String, // Add a preview of the content
    },

    /// A fetch returned one of EDGAR's known sentinel error bodies (rate limit, 404 alert,
    /// or access denied) rather than a transport-level failure.
    #[error("EDGAR returned a sentinel error body ({kind}) for {url}")]
    Sentinel { url: String, kind: SentinelKind },

    /// All entries in the retry ladder were exhausted without a successful response.
    #[error("retry ladder exhausted after {attempts} attempts for {url}")]
    RetriesExhausted { url: String, attempts: usize },

    /// Blob store backend failure (`object_store` transport/credential/permission errors).
    #[error("blob store error: {0}")]
    Store(#[from] object_store::Error),

    /// Relational catalogue failure.
    #[error("catalogue error: {0}")]
    Catalogue(#[from] sqlx::Error),

    /// A concurrent create lost the idempotency race and the winning row could not be
    /// re-read either (distinct from the ordinary, silently-recovered race).
    #[error("integrity conflict on {entity} could not be resolved by re-read: {detail}")]
    Integrity { entity: String, detail: String },

    /// No catalogue row exists where the caller's invariant assumed one would.
    #[error("expected {0} to exist in the catalogue")]
    CatalogueMissing(String),
}

/// Which of EDGAR's recognised sentinel error bodies triggered a [`EdgarError::Sentinel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentinelKind {
    RateLimited,
    NotFoundAlert,
    AccessDenied,
}

impl std::fmt::Display for SentinelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SentinelKind::RateLimited => "rate limited",
            SentinelKind::NotFoundAlert => "404 alert",
            SentinelKind::AccessDenied => "access denied",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, EdgarError>;

//! Configuration types for customizing Edgar client behavior.
//!
//! The configuration system allows you to control rate limiting, HTTP timeouts,
//! base URLs, and user agent strings. Most users can rely on the defaults provided
//! by `Edgar::new()`, but custom configurations are useful for testing, research
//! applications with specific performance requirements, or compliance scenarios.

use std::time::Duration;

/// Configuration settings for the Edgar HTTP client.
///
/// This struct contains all the settings needed to customize how the Edgar client
/// behaves, including network timeouts, rate limiting, and service endpoints. The
/// default configuration is optimized for general use and SEC.gov compliance, but
/// you can adjust these settings based on your application's needs.
///
/// # Examples
///
/// Using defaults:
/// ```rust
/// # use edgar_ingest::config::EdgarConfig;
/// let config = EdgarConfig::default();
/// ```
///
/// Custom configuration:
/// ```rust
/// # use edgar_ingest::config::{EdgarConfig, EdgarUrls};
/// # use std::time::Duration;
/// let config = EdgarConfig::new(
///     "research_app/1.0 contact@university.edu",
///     5,  // More conservative rate
///     Duration::from_secs(45),
///     None,  // Use default URLs
/// );
/// ```
#[derive(Debug, Clone)]
pub struct EdgarConfig {
    /// User agent string for HTTP requests (required by SEC)
    pub user_agent: String,

    /// Rate limit in requests per second (default: 10)
    pub rate_limit: u32,

    /// HTTP request timeout duration
    pub timeout: Duration,

    /// Base URLs for different EDGAR services
    pub base_urls: EdgarUrls,
}

/// Base URLs for the different SEC EDGAR service endpoints.
///
/// The SEC EDGAR system is distributed across multiple domains, each serving
/// different types of content. The archives domain hosts historical filings,
/// the data domain provides structured API access, and the files domain serves
/// various data files. You typically won't need to change these unless you're
/// running tests against a mock server.
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    /// Archives base URL (historical filings)
    pub archives: String,

    /// Data API base URL (structured data)
    pub data: String,

    /// Files base URL (company tickers, etc.)
    pub files: String,

    /// Search API base URL
    pub search: String,
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            user_agent: "edgar-ingest/0.1.0".to_string(),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            base_urls: EdgarUrls {
                archives: "https://www.sec.gov/Archives/edgar".to_string(),
                data: "https://data.sec.gov".to_string(),
                files: "https://www.sec.gov/files".to_string(),
                search: "https://efts.sec.gov/LATEST/search-index/".to_string(),
            },
        }
    }
}

impl EdgarConfig {
    /// Creates custom Edgar configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use edgar_ingest::config::{EdgarConfig, EdgarUrls};
    /// use std::time::Duration;
    ///
    /// let config = EdgarConfig::new(
    ///     "MyApp contact@example.com",
    ///     10,
    ///     Duration::from_secs(30),
    ///     None,
    /// );
    /// ```
    pub fn new(
        user_agent: impl Into<String>,
        rate_limit: u32,
        timeout: Duration,
        base_urls: Option<EdgarUrls>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            rate_limit,
            timeout,
            base_urls: base_urls.unwrap_or_default(),
        }
    }
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            data: "https://data.sec.gov".to_string(),
            files: "https://www.sec.gov/files".to_string(),
            search: "https://efts.sec.gov/LATEST/search-index/".to_string(),
        }
    }
}

/// Which object-store backend a [`crate::blob_store::BlobStore`] is backed by, and its
/// backend-specific credentials.
///
/// Selected at process start by the `CLIENT_TYPE` environment variable; the generic
/// `BlobStore` surface never exposes these fields, only the constructor does.
#[derive(Debug, Clone)]
pub enum BlobStoreConfig {
    S3 {
        bucket: String,
        region: String,
        access_key_id: String,
        secret_access_key: String,
    },
    AzureBlob {
        connection_string: String,
        container: String,
    },
    AzureDataLake {
        account: String,
        tenant_id: String,
        client_id: String,
        client_secret: String,
        filesystem: String,
    },
    Local {
        root: std::path::PathBuf,
    },
}

impl BlobStoreConfig {
    /// Reads `CLIENT_TYPE` and the matching backend-specific variables from the process
    /// environment.
    pub fn from_env() -> Result<Self, crate::error::EdgarError> {
        let client_type = std::env::var("CLIENT_TYPE").unwrap_or_else(|_| "Local".to_string());
        let var = |name: &str| {
            std::env::var(name)
                .map_err(|_| crate::error::EdgarError::ConfigError(format!("missing {name}")))
        };

        match client_type.as_str() {
            "S3" => Ok(BlobStoreConfig::S3 {
                bucket: var("S3_BUCKET")?,
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: var("AWS_ACCESS_KEY_ID")?,
                secret_access_key: var("AWS_SECRET_ACCESS_KEY")?,
            }),
            "Blob" => Ok(BlobStoreConfig::AzureBlob {
                connection_string: var("AZURE_STORAGE_CONNECTION_STRING")?,
                container: var("AZURE_STORAGE_CONTAINER")?,
            }),
            "ADL" => Ok(BlobStoreConfig::AzureDataLake {
                account: var("AZURE_STORAGE_ACCOUNT")?,
                tenant_id: var("AZURE_TENANT_ID")?,
                client_id: var("AZURE_CLIENT_ID")?,
                client_secret: var("AZURE_CLIENT_SECRET")?,
                filesystem: var("AZURE_ADL_FILESYSTEM")?,
            }),
            "Local" => {
                let root = std::env::var("LOCAL_STORE_ROOT").unwrap_or_else(|_| "./edgar-store".to_string());
                Ok(BlobStoreConfig::Local { root: root.into() })
            }
            other => Err(crate::error::EdgarError::ConfigError(format!(
                "unknown CLIENT_TYPE: {other}"
            ))),
        }
    }
}

/// Top-level configuration for the ingestion pipeline, composing the EDGAR client
/// configuration with the blob store backend, the catalogue connection, and the
/// text-extraction endpoint. Constructed once at process start and passed explicitly
/// to component constructors rather than read ad hoc from inside them.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub edgar: EdgarConfig,
    pub blob_store: BlobStoreConfig,
    /// Postgres connection string for the relational catalogue.
    pub database_url: String,
    /// Base URL of the external text-extraction (Tika) service, if text extraction is enabled.
    pub tika_url: Option<String>,
    pub zlib_compression_level: u32,
}

impl IngestConfig {
    /// Reads the whole pipeline configuration from the process environment: `CLIENT_TYPE`
    /// and its backend-specific variables (see [`BlobStoreConfig::from_env`]), `DATABASE_URL`,
    /// `TIKA_URL` (optional), and `EDGAR_USER_AGENT`.
    pub fn from_env() -> Result<Self, crate::error::EdgarError> {
        let user_agent = std::env::var("EDGAR_USER_AGENT")
            .unwrap_or_else(|_| "edgar-ingest/0.1.0 (contact@example.com)".to_string());
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| crate::error::EdgarError::ConfigError("missing DATABASE_URL".into()))?;

        Ok(Self {
            edgar: EdgarConfig::new(user_agent, 10, Duration::from_secs(30), None),
            blob_store: BlobStoreConfig::from_env()?,
            database_url,
            tika_url: std::env::var("TIKA_URL").ok(),
            zlib_compression_level: std::env::var("S3_COMPRESSION_LEVEL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(6),
        })
    }
}

//! The EDGAR HTTP client: directory listing, byte fetching, sentinel-error recognition,
//! and the bounded retry ladder.
//!
//! This generalizes the upstream `Edgar` client's retry loop. Where the original used a
//! closed-form exponential backoff (`calculate_backoff`), the ingestion pipeline instead
//! walks an explicit, immutable ladder of durations so the number of
//! attempts and their spacing are fixed and inspectable rather than computed.

use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use scraper::{Html, Selector};
use std::time::Duration;
use tokio::time::sleep;

use super::config::{EdgarConfig, EdgarUrls};
use super::error::{EdgarError, Result, SentinelKind};

/// Bounded, ordered backoff ladder consulted after each transport failure.
/// After the *n*-th failure the client sleeps `RETRY_LADDER[n]`; once the ladder is
/// exhausted the fetch surrenders and returns `(None, None)`.
pub static RETRY_LADDER: &[Duration] = &[
    Duration::from_millis(500),
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
    Duration::from_secs(8),
];

/// Sentinel byte fragments that mark an EDGAR response as an upstream-policy failure
/// rather than a genuine document body, even though the transport layer saw HTTP 200.
const SENTINEL_RATE_LIMIT: &str = "SEC.gov | Request Rate Threshold Exceeded";
const SENTINEL_NOT_FOUND: &str = "SEC.gov | File Not Found Error Alert (404)";
const SENTINEL_ACCESS_DENIED: &str = "<Error><Code>AccessDenied</Code>";

/// Object of exactly this size is EDGAR's rate-limit error page; brittle by
/// design, per the open question recorded in DESIGN.md.
pub const RATE_LIMIT_BODY_SIZE: usize = 2139;

/// Inspects a response body for one of the three known sentinel fragments.
pub fn detect_sentinel(body: &[u8]) -> Option<SentinelKind> {
    let text = String::from_utf8_lossy(body);
    if text.contains(SENTINEL_RATE_LIMIT) {
        Some(SentinelKind::RateLimited)
    } else if text.contains(SENTINEL_NOT_FOUND) {
        Some(SentinelKind::NotFoundAlert)
    } else if text.contains(SENTINEL_ACCESS_DENIED) {
        Some(SentinelKind::AccessDenied)
    } else {
        None
    }
}

#[derive(Debug, Clone)]
pub struct Edgar {
    pub(crate) client: reqwest::Client,
    pub(crate) edgar_archives_url: String,
    pub(crate) edgar_data_url: String,
    pub(crate) edgar_files_url: String,
    pub(crate) edgar_search_url: String,
    /// Inter-request pacing applied after every successful fetch (may be zero).
    pub(crate) request_interval: Duration,
}

impl Edgar {
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_config(EdgarConfig {
            user_agent: user_agent.to_string(),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            base_urls: EdgarUrls::default(),
        })
    }

    pub fn with_config(config: EdgarConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| EdgarError::ConfigError(format!("invalid user agent: {e}")))?,
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| EdgarError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        // `rate_limit` requests/sec maps to a polite inter-request interval; the pipeline
        // relies on cooperative pacing rather than a process-wide token bucket.
        let request_interval = if config.rate_limit == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(1000 / config.rate_limit as u64)
        };

        Ok(Edgar {
            client,
            edgar_archives_url: config.base_urls.archives,
            edgar_data_url: config.base_urls.data,
            edgar_files_url: config.base_urls.files,
            edgar_search_url: config.base_urls.search,
            request_interval,
        })
    }

    pub fn archives_url(&self) -> &str {
        &self.edgar_archives_url
    }

    pub fn data_url(&self) -> &str {
        &self.edgar_data_url
    }

    pub fn files_url(&self) -> &str {
        &self.edgar_files_url
    }

    pub fn search_url(&self) -> &str {
        &self.edgar_search_url
    }

    /// Resolves a path against the EDGAR archives base, producing an absolute URL.
    fn resolve(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.edgar_archives_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("https://www.sec.gov{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Fetches raw bytes at `path` with the retry ladder, inter-request pacing, and
    /// sentinel-body detection.
    ///
    /// Transport-retryable failures are retried through the whole ladder; on exhaustion
    /// the partial state `(None, None)` is returned rather than an error, treating ladder
    /// exhaustion as "give up gracefully" rather than a hard failure. A recognised sentinel
    /// body raises a typed error immediately (never retried within this client).
    pub async fn get_buffer(&self, path: &str) -> Result<(Option<Vec<u8>>, Option<NaiveDate>)> {
        let url = self.resolve(path);
        let mut attempt = 0usize;

        loop {
            let response = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(e) => {
                    if attempt >= RETRY_LADDER.len() {
                        tracing::warn!(url = %url, "retry ladder exhausted: {e}");
                        return Ok((None, None));
                    }
                    tracing::warn!(url = %url, attempt, "transport error, backing off: {e}");
                    sleep(RETRY_LADDER[attempt]).await;
                    attempt += 1;
                    continue;
                }
            };

            let last_modified = response
                .headers()
                .get(reqwest::header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_last_modified);

            if !response.status().is_success() {
                if attempt >= RETRY_LADDER.len() {
                    tracing::warn!(url = %url, status = %response.status(), "retry ladder exhausted");
                    return Ok((None, None));
                }
                tracing::warn!(url = %url, status = %response.status(), attempt, "non-success status, backing off");
                sleep(RETRY_LADDER[attempt]).await;
                attempt += 1;
                continue;
            }

            let bytes = response.bytes().await.map_err(EdgarError::RequestError)?;

            if let Some(kind) = detect_sentinel(&bytes) {
                return Err(EdgarError::Sentinel {
                    url,
                    kind,
                });
            }

            if !self.request_interval.is_zero() {
                sleep(self.request_interval).await;
            }

            return Ok((Some(bytes.to_vec()), last_modified));
        }
    }

    /// Lists directory entries under `path` by scraping EDGAR's directory-index HTML
    /// for links inside `#main-content`, excluding the `Parent Directory` entry.
    pub async fn list_path(&self, path: &str) -> Result<Vec<String>> {
        let url = self.resolve(path);
        let (body, _) = self.get_buffer(path).await?;
        let body = match body {
            Some(b) => b,
            None => return Ok(Vec::new()),
        };
        let text = String::from_utf8_lossy(&body);
        let document = Html::parse_document(&text);

        let container = Selector::parse("#main-content").unwrap();
        let link = Selector::parse("a").unwrap();

        let mut out = Vec::new();
        for main in document.select(&container) {
            for a in main.select(&link) {
                let text = a.text().collect::<String>();
                if text.trim() == "Parent Directory" {
                    continue;
                }
                if let Some(href) = a.value().attr("href") {
                    out.push(normalize_link(&url, href, text.ends_with('/')));
                }
            }
        }
        Ok(out)
    }

    /// Walks the EDGAR full-index root, yielding each `form.*` index under every
    /// `QTR*` subdirectory of every year directory in `[min_year, max_year]`.
    pub async fn list_index(&self, min_year: i32, max_year: i32) -> Result<Vec<String>> {
        let root = "/Archives/edgar/full-index/";
        let years = self.list_path(root).await?;
        let mut out = Vec::new();

        for year_url in years {
            let Some(year) = last_segment(&year_url).parse::<i32>().ok() else {
                continue;
            };
            if year < min_year || year > max_year {
                continue;
            }
            let quarters = self.list_path(&year_url).await?;
            for qtr_url in quarters {
                if !last_segment(&qtr_url).to_uppercase().starts_with("QTR") {
                    continue;
                }
                let files = self.list_path(&qtr_url).await?;
                for f in files {
                    if last_segment(&f).starts_with("form.") {
                        out.push(f);
                    }
                }
            }
        }
        Ok(out)
    }

    pub async fn list_index_by_year(&self, year: i32) -> Result<Vec<String>> {
        self.list_index(year, year).await
    }

    pub async fn list_index_by_quarter(&self, year: i32, quarter: u8) -> Result<Vec<String>> {
        let qtr_path = format!("/Archives/edgar/full-index/{year}/QTR{quarter}/");
        let files = self.list_path(&qtr_path).await?;
        Ok(files
            .into_iter()
            .filter(|f| last_segment(f).starts_with("form."))
            .collect())
    }

    /// No per-month index exists upstream; this filters the quarter's daily-index entries
    /// down to the requested month.
    /// Daily index names follow `form.MMDDYY.idx`, so the month is the filename's leading
    /// two digits after the `form.` prefix.
    pub async fn list_index_by_month(&self, year: i32, month: u8) -> Result<Vec<String>> {
        let quarter = ((month - 1) / 3) + 1;
        let daily_path = format!("/Archives/edgar/daily-index/{year}/QTR{quarter}/");
        let files = self.list_path(&daily_path).await?;
        let month_tag = format!("{month:02}");
        Ok(files
            .into_iter()
            .filter(|f| {
                let name = last_segment(f);
                name.strip_prefix("form.")
                    .map(|rest| rest.starts_with(&month_tag))
                    .unwrap_or(false)
            })
            .collect())
    }

    /// The canonical blob-store path prefix for a CIK's filings.
    pub fn get_cik_path(&self, cik: u64) -> String {
        format!("edgar/data/{cik}/")
    }

    /// Legacy lookup: HTML-scrapes a company's EDGAR browse page for its current name.
    pub async fn get_company(&self, cik: u64) -> Result<Option<String>> {
        let path = format!(
            "/cgi-bin/browse-edgar?action=getcompany&CIK={cik:010}&type=&dateb=&owner=include&count=1"
        );
        let (body, _) = self.get_buffer(&path).await?;
        let Some(body) = body else { return Ok(None) };
        let text = String::from_utf8_lossy(&body);
        let document = Html::parse_document(&text);
        let selector = Selector::parse("span.companyName").unwrap();
        Ok(document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .map(|s| s.split("CIK#").next().unwrap_or(&s).trim().to_string()))
    }

    /// Legacy lookup: the CFIA SIC/CIK cross-reference index page.
    pub async fn get_cfia_index(&self) -> Result<Vec<String>> {
        self.list_path("/Archives/edgar/data/cfia/").await
    }

    /// Legacy lookup: one fixed-width CFIA table, yielding `(cik, name)` pairs.
    pub async fn get_cfia_table(&self, index: &str) -> Result<Vec<(u64, String)>> {
        let (body, _) = self.get_buffer(index).await?;
        let Some(body) = body else { return Ok(Vec::new()) };
        let text = String::from_utf8_lossy(&body);
        Ok(text
            .lines()
            .filter_map(|line| {
                if line.len() < 20 {
                    return None;
                }
                let cik = line[..10].trim().parse::<u64>().ok()?;
                let name = line[10..].trim().to_string();
                Some((cik, name))
            })
            .collect())
    }
}

fn parse_last_modified(raw: &str) -> Option<NaiveDate> {
    // RFC 2822, e.g. "Wed, 21 Oct 2015 07:28:00 GMT" — tolerate parse failure silently.
    chrono::DateTime::parse_from_rfc2822(raw)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Maps a fully-resolved EDGAR URL or absolute archives path to the canonical blob
/// store key it mirrors under, e.g.
/// `https://www.sec.gov/Archives/edgar/full-index/1994/QTR3/form.idx` or
/// `/Archives/edgar/data/7323/0000007323-94-000018.txt` both become
/// `edgar/full-index/1994/QTR3/form.idx` / `edgar/data/7323/0000007323-94-000018.txt`.
pub fn to_blob_key(path: &str) -> String {
    let p = path
        .trim_start_matches("https://www.sec.gov")
        .trim_start_matches("http://www.sec.gov");
    let p = p.trim_start_matches('/');
    p.strip_prefix("Archives/").unwrap_or(p).to_string()
}

/// Inverse of [`to_blob_key`]: the absolute archives path `get_buffer`/`resolve` expect
/// for a canonical `edgar/…` blob store key.
pub fn to_archive_path(key: &str) -> String {
    format!("/Archives/{}", key.trim_start_matches('/'))
}

fn last_segment(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

fn normalize_link(base_url: &str, href: &str, is_dir_hint: bool) -> String {
    let joined = if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("https://www.sec.gov{href}")
    } else {
        let base = base_url.trim_end_matches('/');
        format!("{base}/{href}")
    };
    if is_dir_hint && !joined.ends_with('/') {
        format!("{joined}/")
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_sentinel_matches_rate_limit_body() {
        let body = b"...SEC.gov | Request Rate Threshold Exceeded...";
        assert_eq!(detect_sentinel(body), Some(SentinelKind::RateLimited));
    }

    #[test]
    fn detect_sentinel_matches_not_found_alert() {
        let body = b"SEC.gov | File Not Found Error Alert (404)";
        assert_eq!(detect_sentinel(body), Some(SentinelKind::NotFoundAlert));
    }

    #[test]
    fn detect_sentinel_matches_access_denied_xml() {
        let body = b"<Error><Code>AccessDenied</Code><Message>x</Message></Error>";
        assert_eq!(detect_sentinel(body), Some(SentinelKind::AccessDenied));
    }

    #[test]
    fn detect_sentinel_is_none_for_ordinary_body() {
        assert_eq!(detect_sentinel(b"<html>hello</html>"), None);
    }

    #[test]
    fn retry_ladder_is_strictly_increasing() {
        for w in RETRY_LADDER.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn last_segment_strips_trailing_slash() {
        assert_eq!(last_segment("/Archives/edgar/full-index/1994/"), "1994");
        assert_eq!(last_segment("/Archives/edgar/full-index/1994/QTR3/"), "QTR3");
    }

    #[test]
    fn to_blob_key_strips_domain_and_archives_prefix() {
        assert_eq!(
            to_blob_key("https://www.sec.gov/Archives/edgar/full-index/1994/QTR3/form.idx"),
            "edgar/full-index/1994/QTR3/form.idx"
        );
        assert_eq!(
            to_blob_key("/Archives/edgar/data/7323/a.txt"),
            "edgar/data/7323/a.txt"
        );
    }

    #[test]
    fn to_archive_path_round_trips_to_blob_key() {
        let key = to_blob_key("https://www.sec.gov/Archives/edgar/data/7323/a.txt");
        assert_eq!(to_archive_path(&key), "/Archives/edgar/data/7323/a.txt");
    }
}

//! Decodes a fixed-width EDGAR `form.idx` file (optionally gzip, sometimes double-gzip)
//! into a tabular projection, built on the same fixed-width column-splitting idiom used
//! elsewhere in this crate, generalized with the decompression chain a raw `.idx` download
//! needs that an already-decompressed JSON fetch never would.
//!
//! Pure function, free of I/O: `parse_index_file` takes bytes in, records out, and never
//! raises — any unrecoverable failure yields an empty table.

use flate2::read::GzDecoder;
use flate2::read::ZlibDecoder;
use std::io::Read;

/// One row of the canonical five-column projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub form_type: String,
    pub cik: u64,
    pub company_name: String,
    pub date_filed: String,
    pub file_name: String,
}

/// Decodes `buf` through the gzip / zlib / double-gzip fallback chain and parses the
/// resulting text as a fixed-width `form.idx`. Returns an empty vector on any
/// unrecoverable failure — this function never raises.
pub fn parse_index_file(buf: &[u8]) -> Vec<IndexRecord> {
    let text = match decode_text(buf) {
        Some(t) => t,
        None => return Vec::new(),
    };
    parse_index_text(&text)
}

/// Runs the decompression chain: single-pass gzip, then
/// zlib (if the buffer starts with a valid zlib header), then raw UTF-8, with a
/// `double_gz` escape hatch for malformed early-era indices that are gzipped twice.
fn decode_text(buf: &[u8]) -> Option<String> {
    if let Some(once) = try_gunzip(buf) {
        if let Ok(text) = String::from_utf8(once.clone()) {
            return Some(text);
        }
        // UTF-8 decode failed on the single-pass result: try decompressing again
        // before giving up, per the `double_gz` workaround for malformed indices.
        if let Some(twice) = try_gunzip(&once) {
            if let Ok(text) = String::from_utf8(twice) {
                return Some(text);
            }
        }
        return None;
    }

    if is_zlib_header(buf) {
        if let Some(inflated) = try_zlib_inflate(buf) {
            if let Ok(text) = String::from_utf8(inflated) {
                return Some(text);
            }
        }
        return None;
    }

    String::from_utf8(buf.to_vec()).ok()
}

fn try_gunzip(buf: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = GzDecoder::new(buf);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}

/// `buf[0] == 0x78` and `(buf[1] + 0x7800) mod 31 == 0` is the standard zlib-header check.
fn is_zlib_header(buf: &[u8]) -> bool {
    buf.len() >= 2 && buf[0] == 0x78 && (buf[1] as u32 + 0x7800) % 31 == 0
}

fn try_zlib_inflate(buf: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(buf);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).ok()?;
    Some(out)
}

/// Parses already-decoded text: locates the `Form Type` header line (normalising the
/// known `Form` variant), the dash separator that follows, and fixed-width-parses every
/// data line using column widths inferred from the separator's runs of dashes.
fn parse_index_text(text: &str) -> Vec<IndexRecord> {
    let lines: Vec<&str> = text.lines().collect();

    let header_idx = lines.iter().position(|l| {
        let trimmed = l.trim_start();
        trimmed.starts_with("Form Type") || trimmed.starts_with("Form ")
    });
    let Some(header_idx) = header_idx else {
        return Vec::new();
    };

    let separator_idx = lines[header_idx + 1..]
        .iter()
        .position(|l| l.trim().chars().all(|c| c == '-') && !l.trim().is_empty())
        .map(|i| i + header_idx + 1);
    let Some(separator_idx) = separator_idx else {
        return Vec::new();
    };

    let widths = infer_column_widths(lines[separator_idx]);
    if widths.is_empty() {
        return Vec::new();
    }

    let header_fields = split_fixed_width(lines[header_idx], &widths);
    let column_order = match resolve_columns(&header_fields) {
        Some(order) => order,
        None => {
            tracing::warn!("form.idx header did not match the canonical five columns; returning unfiltered rows");
            return lines[separator_idx + 1..]
                .iter()
                .filter(|l| !l.trim().is_empty())
                .filter_map(|l| {
                    let fields = split_fixed_width(l, &widths);
                    row_from_positional(&fields)
                })
                .collect();
        }
    };

    lines[separator_idx + 1..]
        .iter()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| {
            let fields = split_fixed_width(l, &widths);
            row_from_columns(&fields, &column_order)
        })
        .collect()
}

/// Column widths are inferred from contiguous runs of `-` in the separator line,
/// separated by at least one space (SEC pads columns with a single space gutter).
fn infer_column_widths(separator: &str) -> Vec<usize> {
    let mut widths = Vec::new();
    let mut run = 0usize;
    for ch in separator.chars() {
        if ch == '-' {
            run += 1;
        } else {
            if run > 0 {
                widths.push(run + 1); // +1 absorbs the single-space gutter
            }
            run = 0;
        }
    }
    if run > 0 {
        widths.push(run);
    }
    widths
}

fn split_fixed_width(line: &str, widths: &[usize]) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    let mut out = Vec::new();
    let mut start = 0usize;
    for &w in widths {
        if start >= chars.len() {
            out.push(String::new());
            continue;
        }
        let end = (start + w).min(chars.len());
        out.push(chars[start..end].iter().collect::<String>().trim().to_string());
        start += w;
    }
    if start < chars.len() {
        out.push(chars[start..].iter().collect::<String>().trim().to_string());
    }
    out
}

const CANONICAL_COLUMNS: &[&str] = &["Form Type", "Company Name", "CIK", "Date Filed", "File Name"];

/// Resolves the header's field order against the five canonical columns, tolerating the
/// malformed `Form` (instead of `Form Type`) header variant.
fn resolve_columns(header_fields: &[String]) -> Option<Vec<usize>> {
    let normalised: Vec<String> = header_fields
        .iter()
        .map(|h| {
            let h = h.trim();
            if h.eq_ignore_ascii_case("form") {
                "Form Type".to_string()
            } else {
                h.to_string()
            }
        })
        .collect();

    let mut order = Vec::with_capacity(CANONICAL_COLUMNS.len());
    for canonical in CANONICAL_COLUMNS {
        let idx = normalised
            .iter()
            .position(|h| h.eq_ignore_ascii_case(canonical))?;
        order.push(idx);
    }
    Some(order)
}

fn row_from_columns(fields: &[String], order: &[usize]) -> Option<IndexRecord> {
    let get = |i: usize| fields.get(i).cloned().unwrap_or_default();
    let form_type = get(order[0]);
    let company_name = get(order[1]);
    let cik_field = get(order[2]);
    let date_filed = get(order[3]);
    let file_name = get(order[4]);

    let cik = cik_field.trim_start_matches('0').parse::<u64>().ok()?;
    Some(IndexRecord {
        form_type,
        cik,
        company_name,
        date_filed,
        file_name,
    })
}

/// Fallback when the header doesn't match any recognised layout: assumes the canonical
/// positional order `{Form Type, Company Name, CIK, Date Filed, File Name}` directly.
fn row_from_positional(fields: &[String]) -> Option<IndexRecord> {
    if fields.len() < 5 {
        return None;
    }
    let cik = fields[2].trim_start_matches('0').parse::<u64>().ok()?;
    Some(IndexRecord {
        form_type: fields[0].clone(),
        company_name: fields[1].clone(),
        cik,
        date_filed: fields[3].clone(),
        file_name: fields[4].clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const SAMPLE: &str = "\
Description:           Form Index of EDGAR Dissemination Feed\n\
Last Data Received:    September 30, 1994\n\
\n\
Form Type   Company Name                                                  CIK         Date Filed  File Name\n\
----------- ------------------------------------------------------------  ----------  ----------  ------------------------------------\n\
10-K        ARKANSAS POWER & LIGHT CO                                     7323        1994-09-30  edgar/data/7323/0000007323-94-000018.txt\n\
8-K         ANOTHER COMPANY INC                                           123456      1994-09-29  edgar/data/123456/0000123456-94-000001.txt\n\
";

    #[test]
    fn parses_plain_text_index() {
        let records = parse_index_file(SAMPLE.as_bytes());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].form_type, "10-K");
        assert_eq!(records[0].cik, 7323);
        assert_eq!(records[0].company_name, "ARKANSAS POWER & LIGHT CO");
        assert_eq!(records[0].date_filed, "1994-09-30");
        assert_eq!(records[0].file_name, "edgar/data/7323/0000007323-94-000018.txt");
    }

    #[test]
    fn parses_gzip_compressed_index() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(SAMPLE.as_bytes()).unwrap();
        let gz = encoder.finish().unwrap();

        let records = parse_index_file(&gz);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cik, 7323);
    }

    #[test]
    fn parses_double_gzip_index() {
        let mut inner = GzEncoder::new(Vec::new(), Compression::default());
        inner.write_all(SAMPLE.as_bytes()).unwrap();
        let once = inner.finish().unwrap();

        let mut outer = GzEncoder::new(Vec::new(), Compression::default());
        outer.write_all(&once).unwrap();
        let twice = outer.finish().unwrap();

        let records = parse_index_file(&twice);
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn normalises_form_only_header() {
        let sample = SAMPLE.replacen("Form Type   Company Name", "Form        Company Name", 1);
        let records = parse_index_file(sample.as_bytes());
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn unparseable_buffer_returns_empty_table() {
        let garbage = vec![0xff, 0xfe, 0xfd, 0xfc];
        assert!(parse_index_file(&garbage).is_empty());
    }

    #[test]
    fn no_header_line_returns_empty_table() {
        assert!(parse_index_file(b"just some\nunrelated text\n").is_empty());
    }
}

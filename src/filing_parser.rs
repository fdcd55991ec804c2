//! Splits a filing envelope (the `<SEC-DOCUMENT>` archive) into its header block and
//! typed `<DOCUMENT>` sub-sections, uudecoding binary payloads and computing per-document
//! digests. Pure functions, free of network/storage side effects — the only
//! side effect modeled here is the optional call into a [`crate::text_extractor::TextExtractor`],
//! which the caller supplies.
//!
//! Uses the same multi-encoding-aware parsing style as the rest of this crate
//! (`encoding_rs` for charset-sensitive legacy documents) and a regex-first
//! metadata extraction idiom.

use regex::Regex;
use sha1::{Digest, Sha1};
use std::sync::LazyLock;

/// One parsed `<DOCUMENT>` sub-section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilingDocumentRecord {
    pub doc_type: Option<String>,
    pub sequence: Option<u32>,
    pub file_name: Option<String>,
    pub description: Option<String>,
    pub content_type: String,
    pub uuencoded: bool,
    /// Byte offset of the `<DOCUMENT>` marker within the decoded envelope.
    pub start_pos: usize,
    /// Byte offset of the matching `</DOCUMENT>` marker's end within the decoded envelope.
    pub end_pos: usize,
    /// Raw (post-uudecode, when applicable) content bytes.
    pub content: Vec<u8>,
    pub sha1: String,
    /// Filled in by the caller when text extraction was requested and returned text.
    pub extracted_text: Option<String>,
}

/// The parsed envelope header plus its ordered documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilingRecord {
    pub accession_number: Option<String>,
    pub form_type: Option<String>,
    pub document_count: Option<u32>,
    pub reporting_period: Option<String>,
    pub date_filed: Option<String>,
    pub company_name: Option<String>,
    pub cik: Option<u64>,
    pub sic: Option<String>,
    pub irs_number: Option<String>,
    pub state_incorporation: Option<String>,
    pub state_location: Option<String>,
    pub documents: Vec<FilingDocumentRecord>,
}

/// Decodes an envelope buffer to text, trying UTF-8, then ISO-8859-1 (via
/// `encoding_rs::WINDOWS_1252`, its common superset), then ISO-8859-5, giving up on
/// total failure.
pub fn decode_envelope(bytes: &[u8]) -> Option<String> {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return Some(s.to_string());
    }
    let (text, _, had_errors) = encoding_rs::WINDOWS_1252.decode(bytes);
    if !had_errors {
        return Some(text.into_owned());
    }
    let (text, _, had_errors) = encoding_rs::ISO_8859_5.decode(bytes);
    if !had_errors {
        return Some(text.into_owned());
    }
    None
}

/// Extracts the header block (`<SEC-HEADER>` or `<IMS-HEADER>`) and every `<DOCUMENT>`
/// section from decoded envelope text, producing the full [`FilingRecord`].
///
/// `extract_text` is invoked once per uuencoded/binary document that decodes successfully,
/// letting the caller plug in the external extraction service without this function
/// doing any I/O itself.
pub fn parse_filing(text: &str, mut extract_text: impl FnMut(&[u8]) -> Option<String>) -> FilingRecord {
    let mut record = header_fields(text);
    record.documents = enumerate_documents(text, &mut extract_text);
    record
}

static SEC_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(SEC-HEADER|IMS-HEADER)>(.*?)</\1>").unwrap()
});

fn header_fields(text: &str) -> FilingRecord {
    let Some(caps) = SEC_HEADER_RE.captures(text) else {
        return FilingRecord::default();
    };
    let header = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    let field = |label: &str| -> Option<String> { find_field(header, label) };

    let cik = field("CENTRAL INDEX KEY").and_then(|s| s.trim_start_matches('0').parse::<u64>().ok().or(Some(0)));
    let document_count = field("PUBLIC DOCUMENT COUNT").and_then(|s| s.trim().parse::<u32>().ok());

    FilingRecord {
        accession_number: field("ACCESSION NUMBER"),
        form_type: field("CONFORMED SUBMISSION TYPE"),
        document_count,
        reporting_period: field("CONFORMED PERIOD OF REPORT"),
        date_filed: field("FILED AS OF DATE"),
        company_name: field("COMPANY CONFORMED NAME"),
        cik,
        sic: field("STANDARD INDUSTRIAL CLASSIFICATION"),
        irs_number: field("IRS NUMBER"),
        state_incorporation: field("STATE OF INCORPORATION"),
        state_location: field("STATE"),
        documents: Vec::new(),
    }
}

/// Looks up `LABEL: VALUE` by literal label (first match wins); missing or empty values
/// are null rather than raising.
fn find_field(header: &str, label: &str) -> Option<String> {
    for line in header.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(label) {
            if let Some(value) = rest.trim_start().strip_prefix(':') {
                let value = value.trim();
                if !value.is_empty() {
                    return Some(value.to_string());
                }
                return None;
            }
        }
    }
    None
}

/// Scans for `<DOCUMENT>` markers paired with the following `</DOCUMENT>` marker,
/// preserving envelope order and recording exact byte offsets.
fn enumerate_documents(
    text: &str,
    extract_text: &mut impl FnMut(&[u8]) -> Option<String>,
) -> Vec<FilingDocumentRecord> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut cursor = 0usize;

    while let Some(start_rel) = find_tag(&text[cursor..], "<DOCUMENT>") {
        let start_pos = cursor + start_rel;
        let search_from = start_pos + "<DOCUMENT>".len();
        let Some(end_rel) = find_tag(&text[search_from..], "</DOCUMENT>") else {
            break;
        };
        let end_pos = search_from + end_rel + "</DOCUMENT>".len();

        let block = &text[start_pos..end_pos];
        if let Some(doc) = parse_document(block, start_pos, end_pos, extract_text) {
            out.push(doc);
        }

        cursor = end_pos.min(bytes.len());
    }

    out
}

fn find_tag(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_uppercase().find(&needle.to_uppercase())
}

static META_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<TYPE>([^\r\n]*)").unwrap());
static META_SEQUENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<SEQUENCE>([^\r\n]*)").unwrap());
static META_FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<FILENAME>([^\r\n]*)").unwrap());
static META_DESCRIPTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<DESCRIPTION>([^\r\n]*)").unwrap());
/// Any opening tag of the form `<WORD>` on its own, used to find the *last* one in the
/// block — the inner content tag bracketing the payload.
static OPENING_TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<([A-Z][A-Z0-9-]*)>").unwrap());

/// Parses one `<DOCUMENT>...</DOCUMENT>` block: single-line metadata markers, then the
/// content payload bracketed by the *last* opening tag in the block and its matching
/// close, classified by the first 100 bytes of content.
fn parse_document(
    block: &str,
    start_pos: usize,
    end_pos: usize,
    extract_text: &mut impl FnMut(&[u8]) -> Option<String>,
) -> Option<FilingDocumentRecord> {
    let doc_type = META_TYPE_RE.captures(block).map(|c| c[1].trim().to_string());
    let sequence = META_SEQUENCE_RE
        .captures(block)
        .and_then(|c| c[1].trim().parse::<u32>().ok());
    let file_name = META_FILENAME_RE.captures(block).map(|c| c[1].trim().to_string());
    let description = META_DESCRIPTION_RE.captures(block).map(|c| c[1].trim().to_string());

    // The last opening tag (skipping metadata tags we've already parsed) brackets content.
    let content_tag = OPENING_TAG_RE
        .captures_iter(block)
        .map(|c| c[1].to_string())
        .filter(|t| !matches!(t.as_str(), "DOCUMENT" | "TYPE" | "SEQUENCE" | "FILENAME" | "DESCRIPTION"))
        .next_back()?;

    let open_marker = format!("<{content_tag}>");
    let close_marker = format!("</{content_tag}>");
    let open_at = find_tag(block, &open_marker)?;
    let content_start = open_at + open_marker.len();
    let close_rel = find_tag(&block[content_start..], &close_marker)?;
    let content_raw = &block[content_start..content_start + close_rel];
    let content_raw = content_raw.trim_start_matches(['\r', '\n']);

    let preview: String = content_raw.chars().take(100).collect();
    let preview_upper = preview.to_uppercase();

    let (content_type, uuencoded) = if preview_upper.contains("<PDF>") {
        ("application/pdf".to_string(), true)
    } else if preview_upper.contains("<HTML") {
        ("text/html".to_string(), false)
    } else if preview_upper.contains("<XML") || preview_upper.contains("<?XML") {
        ("application/xml".to_string(), false)
    } else if preview.starts_with("\nbegin ") || content_raw.starts_with("begin ") {
        let guess = file_name
            .as_deref()
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());
        (guess, true)
    } else {
        ("text/plain".to_string(), false)
    };

    let content = if uuencoded {
        uudecode(content_raw)
    } else {
        content_raw.as_bytes().to_vec()
    };

    let sha1 = sha1_hex(&content);
    let extracted_text = extract_text(&content);

    Some(FilingDocumentRecord {
        doc_type,
        sequence,
        file_name,
        description,
        content_type,
        uuencoded,
        start_pos,
        end_pos,
        content,
        sha1,
        extracted_text,
    })
}

pub fn sha1_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Decodes canonical uuencoded text: locates the `begin <mode> <name>` header, then
/// consumes lines until `end`, tolerating mis-sized lines by truncating to the declared
/// byte count `nbytes = (((first_char - 32) & 63) * 4 + 5) / 3`.
pub fn uudecode(text: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut started = false;

    for line in text.lines() {
        if !started {
            if line.starts_with("begin ") {
                started = true;
            }
            continue;
        }
        if line == "end" || line.trim() == "end" {
            break;
        }
        if line.is_empty() {
            continue;
        }
        let first = line.as_bytes()[0];
        if first < 32 {
            continue;
        }
        let declared = (((first as i32 - 32) & 63) * 4 + 5) / 3;
        if declared <= 0 {
            continue;
        }
        let decoded = decode_uu_line(&line[1..]);
        let take = (declared as usize).min(decoded.len());
        out.extend_from_slice(&decoded[..take]);
    }

    out
}

fn decode_uu_char(c: u8) -> u8 {
    (c.wrapping_sub(32)) & 63
}

/// Decodes one uuencoded data line (after the length-prefix character) into raw bytes,
/// 4 encoded chars -> 3 decoded bytes per group.
fn decode_uu_line(rest: &str) -> Vec<u8> {
    let chars: Vec<u8> = rest.bytes().collect();
    let mut out = Vec::new();
    for chunk in chars.chunks(4) {
        if chunk.is_empty() {
            break;
        }
        let c0 = decode_uu_char(chunk[0]);
        let c1 = chunk.get(1).map(|&c| decode_uu_char(c)).unwrap_or(0);
        let c2 = chunk.get(2).map(|&c| decode_uu_char(c)).unwrap_or(0);
        let c3 = chunk.get(3).map(|&c| decode_uu_char(c)).unwrap_or(0);

        out.push((c0 << 2) | (c1 >> 4));
        out.push((c1 << 4) | (c2 >> 2));
        out.push((c2 << 6) | c3);
    }
    out
}

/// Canonical uuencoding, used only by round-trip tests.
#[cfg(test)]
fn uuencode(data: &[u8]) -> String {
    let mut out = String::new();
    out.push_str("begin 644 test\n");
    for chunk in data.chunks(45) {
        out.push(encode_uu_char(chunk.len() as u8));
        for group in chunk.chunks(3) {
            let b0 = group[0];
            let b1 = *group.get(1).unwrap_or(&0);
            let b2 = *group.get(2).unwrap_or(&0);
            out.push(encode_uu_char(b0 >> 2));
            out.push(encode_uu_char(((b0 << 4) | (b1 >> 4)) & 63));
            out.push(encode_uu_char(((b1 << 2) | (b2 >> 6)) & 63));
            out.push(encode_uu_char(b2 & 63));
        }
        out.push('\n');
    }
    out.push_str("`\nend\n");
    out
}

#[cfg(test)]
fn encode_uu_char(v: u8) -> char {
    let v = v & 63;
    if v == 0 { '`' } else { (v + 32) as char }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_ENVELOPE: &str = "\
<SEC-DOCUMENT>0000007323-94-000018.txt : 19940930\n\
<SEC-HEADER>0000007323-94-000018.hdr.sgml : 19940930\n\
ACCESSION NUMBER:\t\t0000007323-94-000018\n\
CONFORMED SUBMISSION TYPE:\t10-K\n\
PUBLIC DOCUMENT COUNT:\t\t2\n\
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
Some plain text filing body.\n\
</TEXT>\n\
</DOCUMENT>\n\
</SEC-DOCUMENT>\n";

    #[test]
    fn parses_archaic_header_fields() {
        let record = parse_filing(SAMPLE_ENVELOPE, |_| None);
        assert_eq!(record.company_name.as_deref(), Some("ARKANSAS POWER & LIGHT CO"));
        assert_eq!(record.sic.as_deref(), Some("4911"));
        assert_eq!(record.state_incorporation.as_deref(), Some("AR"));
        assert_eq!(record.cik, Some(7323));
        assert_eq!(record.form_type.as_deref(), Some("10-K"));
    }

    #[test]
    fn enumerates_single_document_with_correct_offsets() {
        let record = parse_filing(SAMPLE_ENVELOPE, |_| None);
        assert_eq!(record.documents.len(), 1);
        let doc = &record.documents[0];
        assert_eq!(doc.content_type, "text/plain");
        assert!(doc.start_pos < doc.end_pos);
        assert!(doc.end_pos <= SAMPLE_ENVELOPE.len());
        assert_eq!(&SAMPLE_ENVELOPE[doc.start_pos..doc.start_pos + "<DOCUMENT>".len()], "<DOCUMENT>");
    }

    #[test]
    fn absent_header_yields_null_fields_and_empty_documents() {
        let record = parse_filing("no header here at all", |_| None);
        assert!(record.company_name.is_none());
        assert!(record.cik.is_none());
        assert!(record.documents.is_empty());
    }

    #[test]
    fn uudecode_round_trips_uuencode() {
        let data = b"The quick brown fox jumps over the lazy dog 0123456789!";
        let encoded = uuencode(data);
        let decoded = uudecode(&encoded);
        assert_eq!(decoded, data);
    }

    #[test]
    fn uudecode_tolerates_truncated_line() {
        let data = b"abc";
        let mut encoded = uuencode(data);
        // Corrupt by appending junk past the declared length on the data line.
        encoded = encoded.replacen('\n', "XXXX\n", 1);
        // Should not panic; truncation to declared nbytes recovers gracefully either way.
        let _ = uudecode(&encoded);
    }

    #[test]
    fn decode_envelope_accepts_valid_utf8() {
        assert_eq!(decode_envelope(b"hello"), Some("hello".to_string()));
    }

    #[test]
    fn sha1_hex_is_stable() {
        let h1 = sha1_hex(b"abc");
        let h2 = sha1_hex(b"abc");
        assert_eq!(h1, h2);
        assert_eq!(h1, "a9993e364706816aba3e25717850c26c9cd0d89d");
    }
}

//! Gzip framing for archived pages
//!
//! Compressed records carry their metadata as JSON in the gzip header comment
//! so a record is one file and the conditional write stays a single atomic
//! create.

use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::{Compression, GzBuilder};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Maximum allowed length for the content type field
///
/// Real-world Content-Type values rarely exceed 100 bytes
/// (`text/html; charset=utf-8` is 24); anything longer is trimmed to the
/// MIME type plus charset.
const MAX_CONTENT_TYPE_LEN: usize = 512;

/// Gzip comment field maximum size per RFC 1952
const MAX_METADATA_JSON_LEN: usize = 60_000;

/// Trim an oversized Content-Type to MIME type plus charset
#[must_use]
pub fn sanitize_content_type(raw: &str) -> String {
    if raw.len() <= MAX_CONTENT_TYPE_LEN {
        return raw.to_string();
    }

    let mut parts = raw.split(';');
    let mut result = parts.next().unwrap_or_default().trim().to_string();
    if let Some(charset) = parts.map(str::trim).find(|p| p.starts_with("charset=")) {
        result.push_str("; ");
        result.push_str(charset);
    }

    if result.len() > MAX_CONTENT_TYPE_LEN {
        let mut cut = MAX_CONTENT_TYPE_LEN;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result.truncate(cut);
        log::warn!("Content-Type extremely long even after parsing, truncated to {cut} bytes");
    }

    result
}

/// Metadata stored alongside compressed records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    /// xxh3 of the uncompressed content, quoted like an HTTP etag
    pub etag: String,
    pub content_type: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub archived_at: DateTime<Utc>,
}

impl ArchiveMetadata {
    #[must_use]
    pub fn for_content(content: &[u8], content_type: &str) -> Self {
        let hash = xxhash_rust::xxh3::xxh3_64(content);
        Self {
            etag: format!("\"{hash:x}\""),
            content_type: sanitize_content_type(content_type),
            archived_at: Utc::now(),
        }
    }
}

/// Gzip `content` into `writer` with `metadata` in the header comment
pub(crate) fn write_gzip<W: Write>(
    writer: W,
    filename: &str,
    content: &[u8],
    metadata: &ArchiveMetadata,
) -> std::io::Result<W> {
    let metadata_json = serde_json::to_string(metadata).map_err(std::io::Error::other)?;
    debug_assert!(
        metadata_json.len() <= MAX_METADATA_JSON_LEN,
        "Metadata JSON unexpectedly large: {} bytes",
        metadata_json.len()
    );

    let mut gz = GzBuilder::new()
        .filename(filename)
        .comment(metadata_json)
        .write(writer, Compression::new(3));
    gz.write_all(content)?;
    gz.finish()
}

/// Decompress a record written by `write_gzip`, returning content and metadata
pub(crate) fn read_gzip<R: Read>(reader: R) -> std::io::Result<(Vec<u8>, ArchiveMetadata)> {
    let mut gz = GzDecoder::new(reader);
    let mut content = Vec::new();
    gz.read_to_end(&mut content)?;

    let header = gz
        .header()
        .ok_or_else(|| std::io::Error::other("No gzip header found"))?;
    let comment = std::str::from_utf8(header.comment().unwrap_or(&[]))
        .map_err(|e| std::io::Error::other(format!("Invalid UTF-8 in gzip comment: {e}")))?;
    let metadata: ArchiveMetadata = serde_json::from_str(comment)
        .map_err(|e| std::io::Error::other(format!("Failed to parse archive metadata: {e}")))?;

    Ok((content, metadata))
}

//! Cached Response Module
//!
//! Immutable snapshot of an HTTP response plus the body codec used to store it.

use std::io::{Read, Write};

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};

// == Cached Response ==
/// Snapshot of a full response: status, headers and body.
///
/// `body` holds the stored representation (gzip when `compressed`); use
/// [`body_bytes`](Self::body_bytes) for the original payload.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub status_text: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub created_at: DateTime<Utc>,
    pub etag: Option<String>,
    pub compressed: bool,
    /// Length of the original, uncompressed body
    pub size_bytes: usize,
}

impl CachedResponse {
    /// Builds a snapshot, compressing the body when it reaches `compression_threshold`.
    ///
    /// A threshold of 0 disables compression. Bodies that do not shrink, or
    /// that already carry a `Content-Encoding`, are stored as-is.
    pub fn new(
        status: StatusCode,
        headers: HeaderMap,
        body: Bytes,
        etag: Option<String>,
        compression_threshold: usize,
    ) -> Self {
        let size_bytes = body.len();
        let already_encoded = headers.contains_key(axum::http::header::CONTENT_ENCODING);

        let (stored, compressed) = if compression_threshold > 0
            && size_bytes >= compression_threshold
            && !already_encoded
        {
            match gzip(&body) {
                Ok(packed) if packed.len() < size_bytes => (Bytes::from(packed), true),
                Ok(_) => (body, false),
                Err(err) => {
                    tracing::warn!(error = %err, "Compression failed, storing body uncompressed");
                    (body, false)
                }
            }
        } else {
            (body, false)
        };

        Self {
            status,
            status_text: status.canonical_reason().unwrap_or("").to_string(),
            headers,
            body: stored,
            created_at: Utc::now(),
            etag,
            compressed,
            size_bytes,
        }
    }

    /// Bytes held in memory for this snapshot.
    pub fn stored_bytes(&self) -> usize {
        self.body.len()
    }

    /// The original body, decompressing if needed.
    pub fn body_bytes(&self) -> Result<Bytes> {
        if self.compressed {
            gunzip(&self.body).map(Bytes::from)
        } else {
            Ok(self.body.clone())
        }
    }
}

// == ETag ==
/// Strong validator derived from the body: a quoted, truncated SHA-256 hex digest.
///
/// Identical bodies always produce identical tags.
pub fn generate_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", &hex::encode(digest)[..32])
}

// == Codec ==
/// Gzip-compresses a body.
pub fn gzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CacheError::Codec(format!("Gzip compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| CacheError::Codec(format!("Gzip finalization failed: {}", e)))
}

/// Reverses [`gzip`].
pub fn gunzip(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| CacheError::Codec(format!("Gzip decompression failed: {}", e)))?;
    Ok(out)
}

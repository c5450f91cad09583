//! Report codec: `base64(gzip(json(report)))`.
//!
//! Compression runs at maximum effort. Base64 conversion is done in chunks
//! whose size is a multiple of three bytes, so concatenating the encoded
//! chunks yields exactly the encoding of the whole input.

use std::io::{Read, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::types::Report;
use crate::error_handling::types::ReportError;

/// Bytes converted per base64 call.
pub const ENCODE_CHUNK_BYTES: usize = 3 * 16 * 1024;

pub fn compress(data: &[u8]) -> Result<Vec<u8>, ReportError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(ReportError::CompressionFailed)?;
    encoder.finish().map_err(ReportError::CompressionFailed)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, ReportError> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| ReportError::DecodingFailed(format!("inflate: {}", e)))?;
    Ok(out)
}

pub fn to_base64(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(ENCODE_CHUNK_BYTES) {
        STANDARD.encode_string(chunk, &mut out);
    }
    out
}

/// Whitespace around the payload is ignored.
pub fn from_base64(text: &str) -> Result<Vec<u8>, ReportError> {
    STANDARD
        .decode(text.trim())
        .map_err(|e| ReportError::DecodingFailed(format!("base64: {}", e)))
}

/// Serializes, compresses and encodes a report.
///
/// # Errors
/// [`ReportError::SerializationFailed`] or [`ReportError::CompressionFailed`];
/// nothing is produced in either case.
pub fn encode_report(report: &Report) -> Result<String, ReportError> {
    let json = serde_json::to_vec(report)?;
    let compressed = compress(&json)?;
    Ok(to_base64(&compressed))
}

pub fn decode_report(encoded: &str) -> Result<Report, ReportError> {
    let compressed = from_base64(encoded)?;
    let json = decompress(&compressed)?;
    serde_json::from_slice(&json).map_err(|e| ReportError::DecodingFailed(format!("json: {}", e)))
}

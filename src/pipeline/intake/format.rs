use std::borrow::Cow;
use std::sync::LazyLock;

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::pipeline::BiometricError;

/// Image container formats we recognise by magic bytes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
    Bmp,
    Gif,
    WebP,
    Unknown,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
            Self::Gif => "image/gif",
            Self::WebP => "image/webp",
            Self::Unknown => "application/octet-stream",
        }
    }

    /// Whether a client-declared MIME type is a fair description of this format.
    /// Accepts the common non-canonical spellings (`image/jpg`, `image/tif`).
    pub fn accepts_mime(&self, declared: &str) -> bool {
        let declared = declared.trim().to_ascii_lowercase();
        match self {
            Self::Jpeg => matches!(declared.as_str(), "image/jpeg" | "image/jpg" | "image/pjpeg"),
            Self::Tiff => matches!(declared.as_str(), "image/tiff" | "image/tif"),
            other => declared == other.mime_type(),
        }
    }
}

/// Minimum decoded size for a text payload to be taken seriously.
/// Anything smaller cannot hold a usable fingerprint capture.
pub const MIN_PAYLOAD_BYTES: usize = 1024;

/// Data-URL marker that prefixes browser-captured images.
const DATA_URL_PREFIX: &str = "data:image";

static BASE64_BODY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").expect("static regex"));

/// Detect image format from magic bytes (NOT declared types).
pub fn detect_image_format(bytes: &[u8]) -> ImageFormat {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => ImageFormat::Jpeg,
        [0x89, 0x50, 0x4E, 0x47, ..] => ImageFormat::Png,
        // TIFF: little-endian (49 49 2A 00) or big-endian (4D 4D 00 2A)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => ImageFormat::Tiff,
        // BMP: "BM", file size, then four reserved zero bytes
        [0x42, 0x4D, _, _, _, _, 0, 0, 0, 0, ..] => ImageFormat::Bmp,
        [0x47, 0x49, 0x46, 0x38, ..] => ImageFormat::Gif,
        _ if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" => {
            ImageFormat::WebP
        }
        _ => ImageFormat::Unknown,
    }
}

/// Strip a `data:image/...;base64,` prefix if present.
///
/// A data URL without the comma separator is malformed, not a bare payload.
pub fn strip_data_url(text: &str) -> Result<&str, BiometricError> {
    let text = text.trim();
    if !text.starts_with(DATA_URL_PREFIX) {
        return Ok(text);
    }
    text.split_once(',')
        .map(|(_, body)| body)
        .ok_or_else(|| BiometricError::Encoding("data URL has no ',' separator".into()))
}

/// Decode base64 text (optionally data-URL prefixed) into raw bytes.
///
/// Enforces the standard alphabet and canonical padding. Whitespace (line
/// wrapping from some clients) is removed first.
pub fn decode_base64_payload(text: &str) -> Result<Vec<u8>, BiometricError> {
    let body = strip_data_url(text)?;
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if compact.is_empty() {
        return Err(BiometricError::Encoding("empty base64 payload".into()));
    }
    if !BASE64_BODY.is_match(&compact) {
        return Err(BiometricError::Encoding(
            "payload contains characters outside the base64 alphabet".into(),
        ));
    }

    base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| BiometricError::Encoding(e.to_string()))
}

/// Turn whatever the client sent into raw image bytes.
///
/// Text that is a data URL or consists purely of base64 characters is decoded.
/// Everything else (real image bytes included) passes through untouched; the
/// image decoder reports it if it is undecodable. Binary image containers
/// always carry non-alphabet bytes in their headers, so they never take the
/// text branch.
pub fn normalize_payload(payload: &[u8]) -> Result<Cow<'_, [u8]>, BiometricError> {
    if payload.starts_with(DATA_URL_PREFIX.as_bytes()) || looks_like_base64(payload) {
        let text = std::str::from_utf8(payload)
            .map_err(|e| BiometricError::Encoding(format!("payload is not UTF-8: {e}")))?;
        return decode_base64_payload(text).map(Cow::Owned);
    }

    Ok(Cow::Borrowed(payload))
}

/// Text-level plausibility gate for base64 submissions: well-formed, decodable,
/// and at least [`MIN_PAYLOAD_BYTES`] once decoded.
pub fn is_plausible_payload(text: &str) -> bool {
    match decode_base64_payload(text) {
        Ok(bytes) => bytes.len() >= MIN_PAYLOAD_BYTES,
        Err(e) => {
            tracing::debug!(error = %e, "Payload rejected at text gate");
            false
        }
    }
}

fn looks_like_base64(payload: &[u8]) -> bool {
    let mut significant = 0usize;
    for &b in payload {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' | b'=' => significant += 1,
            b' ' | b'\t' | b'\r' | b'\n' => {}
            _ => return false,
        }
    }
    significant > 0
}

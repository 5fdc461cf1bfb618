//! Upload screening, before any bytes are decoded.
//!
//! Cheap metadata checks on a multipart upload: presence, size, extension,
//! declared MIME type and file name. Content is judged later by the decoder
//! and the content validator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default upload cap in megabytes.
pub const DEFAULT_MAX_UPLOAD_MB: u64 = 10;

const ALLOWED_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".tif", ".tiff"];

const ACCEPTED_MIME_TYPES: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/jpg",
    "image/tiff",
    "image/tif",
];

/// Substrings that disqualify a file name. Matched case-insensitively
/// anywhere in the name.
const SUSPICIOUS_PATTERNS: &[&str] = &[
    "script",
    "executable",
    "binary",
    "exe",
    "bat",
    "cmd",
    "sh",
    "php",
    "asp",
    "jsp",
];

/// Metadata the transport layer knows about an upload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadDescriptor {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub size_bytes: Option<u64>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UploadRejection {
    #[error("No file provided")]
    Missing,

    #[error("File size exceeds maximum allowed size of {max_mb}MB")]
    TooLarge { max_mb: u64 },

    #[error("File extension '{0}' is not allowed. Only fingerprint image files are accepted (PNG, JPG, JPEG, TIF, TIFF).")]
    Extension(String),

    #[error("File type '{0}' is not allowed. Only fingerprint image files are accepted.")]
    MimeType(String),

    #[error("File name contains suspicious pattern '{0}'. Only fingerprint image files are allowed.")]
    SuspiciousName(&'static str),
}

/// Screen upload metadata. Checks run in a fixed order; the first failure wins.
pub fn screen_upload(upload: &UploadDescriptor, max_size_mb: u64) -> Result<(), UploadRejection> {
    let filename = match upload.filename.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => return Err(UploadRejection::Missing),
    };

    if let Some(size) = upload.size_bytes.filter(|&s| s > 0) {
        if size > max_size_mb.saturating_mul(1024 * 1024) {
            return Err(UploadRejection::TooLarge {
                max_mb: max_size_mb,
            });
        }
    }

    let lower = filename.to_lowercase();
    let extension = file_extension(&lower);
    if !ALLOWED_EXTENSIONS.contains(&extension) {
        return Err(UploadRejection::Extension(extension.to_string()));
    }

    if let Some(content_type) = upload.content_type.as_deref().filter(|c| !c.is_empty()) {
        if !ACCEPTED_MIME_TYPES.contains(&content_type) {
            return Err(UploadRejection::MimeType(content_type.to_string()));
        }
    }

    if let Some(pattern) = SUSPICIOUS_PATTERNS.iter().copied().find(|p| lower.contains(p)) {
        tracing::warn!(pattern, "Upload rejected for suspicious file name");
        return Err(UploadRejection::SuspiciousName(pattern));
    }

    Ok(())
}

/// Extension including the leading dot, or "" when there is none.
/// A leading dot alone (".png") names a hidden file, not an extension.
fn file_extension(name: &str) -> &str {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rfind('.') {
        Some(idx) if idx > 0 => &base[idx..],
        _ => "",
    }
}

/// Sanitize a client-supplied file name for logs and storage keys.
pub fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .filter(|&c| c != '/' && c != '\\' && c != '\0')
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let mut sanitized = sanitized.replace("..", "");
    sanitized.truncate(100);

    if sanitized.is_empty() {
        "sample".into()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str, content_type: Option<&str>, size: Option<u64>) -> UploadDescriptor {
        UploadDescriptor {
            filename: Some(name.into()),
            content_type: content_type.map(String::from),
            size_bytes: size,
        }
    }

    #[test]
    fn accepts_plain_png() {
        let u = upload("thumb_left.png", Some("image/png"), Some(40_000));
        assert_eq!(screen_upload(&u, DEFAULT_MAX_UPLOAD_MB), Ok(()));
    }

    #[test]
    fn missing_name_rejected() {
        assert_eq!(
            screen_upload(&UploadDescriptor::default(), 10),
            Err(UploadRejection::Missing)
        );
        assert_eq!(
            screen_upload(&upload("", None, None), 10),
            Err(UploadRejection::Missing)
        );
    }

    #[test]
    fn oversize_rejected_with_limit_in_message() {
        let u = upload("print.png", None, Some(11 * 1024 * 1024));
        let err = screen_upload(&u, 10).unwrap_err();
        assert_eq!(err.to_string(), "File size exceeds maximum allowed size of 10MB");
    }

    #[test]
    fn unknown_size_is_not_checked() {
        assert!(screen_upload(&upload("print.tif", None, None), 1).is_ok());
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(screen_upload(&upload("PRINT.JPEG", None, None), 10).is_ok());
        assert_eq!(
            screen_upload(&upload("print.gif", None, None), 10),
            Err(UploadRejection::Extension(".gif".into()))
        );
        assert_eq!(
            screen_upload(&upload("print", None, None), 10),
            Err(UploadRejection::Extension(String::new()))
        );
    }

    #[test]
    fn mime_type_must_be_image() {
        let u = upload("print.png", Some("application/pdf"), None);
        assert_eq!(
            screen_upload(&u, 10),
            Err(UploadRejection::MimeType("application/pdf".into()))
        );
    }

    #[test]
    fn suspicious_name_rejected() {
        let u = upload("payload_script.png", Some("image/png"), None);
        assert_eq!(
            screen_upload(&u, 10),
            Err(UploadRejection::SuspiciousName("script"))
        );
    }

    #[test]
    fn extension_ignores_directories() {
        assert_eq!(file_extension("dir.v2/print"), "");
        assert_eq!(file_extension("a/b/print.tiff"), ".tiff");
        assert_eq!(file_extension(".png"), "");
    }

    #[test]
    fn sanitize_strips_path_traversal() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "etcpasswd");
        assert_eq!(sanitize_filename("left thumb.png"), "left_thumb.png");
        assert_eq!(sanitize_filename("///"), "sample");
        assert_eq!(sanitize_filename(&"a".repeat(300)).len(), 100);
    }
}

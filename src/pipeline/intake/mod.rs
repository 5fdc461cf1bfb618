pub mod format;
pub mod hash;
pub mod decode;
pub mod upload;

pub use format::*;
pub use hash::*;
pub use decode::*;
pub use upload::*;

use serde::{Deserialize, Serialize};

/// Decoded single-channel intensity grid.
pub type IntensityGrid = image::GrayImage;

/// A submitted sample exactly as received. Lives for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSample {
    pub bytes: Vec<u8>,
    /// Media type claimed by the client. Untrusted.
    pub declared_type: Option<String>,
}

impl RawSample {
    pub fn new(bytes: Vec<u8>, declared_type: Option<String>) -> Self {
        Self {
            bytes,
            declared_type,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Format sniffed from magic bytes, ignoring the declared type.
    pub fn sniffed_format(&self) -> ImageFormat {
        detect_image_format(&self.bytes)
    }

    /// True when the declared media type disagrees with the magic bytes.
    pub fn declared_type_mismatch(&self) -> bool {
        match (&self.declared_type, self.sniffed_format()) {
            (Some(declared), sniffed) if sniffed != ImageFormat::Unknown => {
                !sniffed.accepts_mime(declared)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_sample_reports_length() {
        let s = RawSample::new(vec![1, 2, 3], None);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
    }

    #[test]
    fn declared_type_mismatch_detected() {
        let png_magic = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let honest = RawSample::new(png_magic.clone(), Some("image/png".into()));
        let lying = RawSample::new(png_magic, Some("image/jpeg".into()));
        assert!(!honest.declared_type_mismatch());
        assert!(lying.declared_type_mismatch());
    }

    #[test]
    fn unknown_format_never_flags_mismatch() {
        let s = RawSample::new(vec![0; 10], Some("image/png".into()));
        assert!(!s.declared_type_mismatch());
    }
}

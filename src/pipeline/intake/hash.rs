use std::path::Path;
use std::sync::LazyLock;

use base64::Engine;
use image::GrayImage;
use regex::Regex;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::pipeline::BiometricError;

static SHA256_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-fA-F0-9]{64}$").expect("static regex"));

/// Raw SHA-256 digest of a byte buffer.
pub fn sha256_digest(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

/// Lowercase hex SHA-256, the form stored alongside enrolled samples.
pub fn sha256_hex(bytes: &[u8]) -> String {
    sha256_digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Base64 SHA-256, used inside compact templates.
pub fn content_hash_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(sha256_digest(bytes))
}

/// True for exactly 64 hex characters, either case.
pub fn is_sha256_hex(candidate: &str) -> bool {
    SHA256_HEX.is_match(candidate)
}

/// Hex SHA-256 of a file on disk.
pub fn hash_file(path: &Path) -> Result<String, BiometricError> {
    let content = std::fs::read(path)?;
    Ok(sha256_hex(&content))
}

/// Perceptual hash of an intensity grid.
/// DoubleGradient, 16x16 (256-bit), base64-encoded.
pub fn perceptual_hash(grid: &GrayImage) -> String {
    let hasher = img_hash::HasherConfig::new()
        .hash_alg(img_hash::HashAlg::DoubleGradient)
        .hash_size(16, 16)
        .to_hasher();

    let img = img_hash::image::DynamicImage::ImageLuma8(grid.clone());
    hasher.hash_image(&img).to_base64()
}

/// Compare two perceptual hashes and return similarity score (0.0-1.0)
pub fn hash_similarity(hash_a: &str, hash_b: &str) -> Option<f64> {
    let a = img_hash::ImageHash::<Vec<u8>>::from_base64(hash_a).ok()?;
    let b = img_hash::ImageHash::<Vec<u8>>::from_base64(hash_b).ok()?;

    let distance = a.dist(&b);
    let max_bits = (a.as_bytes().len() * 8).max(1) as f64;
    Some(1.0 - (distance as f64 / max_bits))
}

/// Opaque 16-character sample identifier (hex of a hashed random UUID).
pub fn generate_sample_id() -> String {
    let mut id = sha256_hex(Uuid::new_v4().as_bytes());
    id.truncate(16);
    id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ridge_image;
    use image::Luma;

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn content_hash_base64_is_44_chars() {
        assert_eq!(content_hash_base64(b"ridge").len(), 44);
    }

    #[test]
    fn hex_format_check() {
        assert!(is_sha256_hex(&sha256_hex(b"x")));
        assert!(!is_sha256_hex("ABC"));
        assert!(!is_sha256_hex(&"a".repeat(63)));
        assert!(!is_sha256_hex(&"g".repeat(64)));
    }

    #[test]
    fn uppercase_digest_is_accepted() {
        let upper = sha256_hex(b"x").to_ascii_uppercase();
        assert!(is_sha256_hex(&upper));
        assert!(is_sha256_hex(&"A".repeat(64)));
    }

    #[test]
    fn file_hash_matches_buffer_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        std::fs::write(&path, b"fingerprint bytes").unwrap();

        assert_eq!(hash_file(&path).unwrap(), sha256_hex(b"fingerprint bytes"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = hash_file(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, BiometricError::Io(_)));
    }

    #[test]
    fn identical_grids_have_perfect_similarity() {
        let grid = ridge_image(64, 64, 8.0);
        let hash = perceptual_hash(&grid);
        assert_eq!(hash, perceptual_hash(&grid));
        let similarity = hash_similarity(&hash, &hash).unwrap();
        assert!((similarity - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn different_grids_are_less_similar() {
        let a = perceptual_hash(&ridge_image(64, 64, 8.0));
        let b = perceptual_hash(&GrayImage::from_fn(64, 64, |x, _| Luma([(x * 4) as u8])));
        assert!(hash_similarity(&a, &b).unwrap() < 1.0);
    }

    #[test]
    fn similarity_rejects_garbage() {
        assert!(hash_similarity("***", "***").is_none());
    }

    #[test]
    fn sample_ids_are_short_and_unique() {
        let a = generate_sample_id();
        let b = generate_sample_id();
        assert_eq!(a.len(), 16);
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }
}

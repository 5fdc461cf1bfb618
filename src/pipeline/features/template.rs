//! Storable summary of an enrolled sample.
//!
//! The template is what a host persists instead of the raw capture: content
//! hashes plus the geometry and keypoint count. It travels as base64 of a
//! compact JSON object.

use base64::Engine;
use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::FeatureSet;
use crate::pipeline::intake::hash::{is_sha256_hex, perceptual_hash, sha256_hex};
use crate::pipeline::BiometricError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrollmentTemplate {
    /// Hex SHA-256 of the grid's raw row-major pixels.
    pub image_hash: String,
    /// Base64 perceptual hash of the grid.
    pub perceptual_hash: String,
    pub feature_count: usize,
    pub width: u32,
    pub height: u32,
}

impl EnrollmentTemplate {
    pub fn from_sample(grid: &GrayImage, features: &FeatureSet) -> Self {
        Self {
            image_hash: sha256_hex(grid.as_raw()),
            perceptual_hash: perceptual_hash(grid),
            feature_count: features.len(),
            width: grid.width(),
            height: grid.height(),
        }
    }

    /// Base64(JSON) form for storage.
    pub fn encode(&self) -> Result<String, BiometricError> {
        let json = serde_json::to_vec(self)
            .map_err(|e| BiometricError::Template(format!("serialize: {e}")))?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }

    pub fn decode(encoded: &str) -> Result<Self, BiometricError> {
        let json = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim().as_bytes())
            .map_err(|e| BiometricError::Template(format!("base64: {e}")))?;
        let mut template: Self = serde_json::from_slice(&json)
            .map_err(|e| BiometricError::Template(format!("json: {e}")))?;

        if !is_sha256_hex(&template.image_hash) {
            return Err(BiometricError::Template(
                "image_hash is not a SHA-256 hex digest".into(),
            ));
        }
        template.image_hash.make_ascii_lowercase();
        Ok(template)
    }

    /// Same pixels as `grid`.
    pub fn matches_grid(&self, grid: &GrayImage) -> bool {
        self.width == grid.width()
            && self.height == grid.height()
            && self.image_hash == sha256_hex(grid.as_raw())
    }
}

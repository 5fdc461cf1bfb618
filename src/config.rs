//! Tunables for every stage of the fingerprint pipeline.
//!
//! Defaults reproduce the production constants. Hosts that keep tunables in a
//! file can load them with [`GateConfig::from_json_str`]; every section is
//! `#[serde(default)]`, so a partial document only overrides what it names.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Application-level constants
pub const APP_NAME: &str = "ridgegate";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "ridgegate=info"
}

/// Install a `fmt` subscriber for hosts that have no tracing setup of their own.
///
/// The library itself never calls this. Safe to call more than once: a second
/// call leaves the first subscriber in place.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_log_filter())),
        )
        .try_init();
}

/// Quality thresholds used by the two intake call sites.
///
/// Neither is applied implicitly: callers pass a threshold on every call.
pub mod thresholds {
    /// Verification path: lenient, only rejects clearly unusable captures.
    pub const VERIFY: f64 = 0.3;

    /// Enrollment path: a stored template should come from a good capture.
    pub const ENROLL: f64 = 0.7;
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ═══════════════════════════════════════════════════════════
// Sections
// ═══════════════════════════════════════════════════════════

/// Side-length bands, loosest to tightest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionLimits {
    /// Below this on either side the quality score is pinned low and no
    /// features are extracted.
    pub min_side: u32,
    /// Content validation lower bound.
    pub validation_min_side: u32,
    /// Content validation upper bound.
    pub validation_max_side: u32,
    /// Hard intake cap. Anything larger is refused before any filtering.
    pub intake_max_side: u32,
}

impl Default for DimensionLimits {
    fn default() -> Self {
        Self {
            min_side: 100,
            validation_min_side: 200,
            validation_max_side: 2000,
            intake_max_side: 5000,
        }
    }
}

/// Weight tuple for the combined quality score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityWeights {
    pub contrast: f64,
    pub sharpness: f64,
    pub brightness: f64,
    pub noise: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            contrast: 0.3,
            sharpness: 0.3,
            brightness: 0.2,
            noise: 0.2,
        }
    }
}

impl QualityWeights {
    pub fn sum(&self) -> f64 {
        self.contrast + self.sharpness + self.brightness + self.noise
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    pub weights: QualityWeights,
    /// Laplacian variance that maps to a sharpness of 1.0.
    pub sharpness_normalizer: f64,
    /// Score assigned to grids below `DimensionLimits::min_side`.
    pub undersized_score: f64,
    /// Score returned when the assessor faults internally.
    pub fallback_score: f64,
    /// Median filter radius for noise estimation (2 = 5x5 window).
    pub median_radius: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            weights: QualityWeights::default(),
            sharpness_normalizer: 1000.0,
            undersized_score: 0.1,
            fallback_score: 0.5,
            median_radius: 2,
        }
    }
}

/// Oriented band-pass kernel used as the ridge detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaborParams {
    /// Kernel side (odd).
    pub size: usize,
    pub sigma: f64,
    /// Orientation in radians.
    pub theta: f64,
    /// Wavelength in pixels.
    pub lambda: f64,
    /// Spatial aspect ratio.
    pub gamma: f64,
    /// Phase offset.
    pub psi: f64,
}

impl Default for GaborParams {
    fn default() -> Self {
        Self {
            size: 21,
            sigma: 5.0,
            theta: 0.0,
            lambda: 10.0,
            gamma: 0.5,
            psi: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationThresholds {
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub min_brightness: f64,
    pub max_brightness: f64,
    /// Minimum intensity standard deviation.
    pub min_std: f64,
    /// Minimum standard deviation of the Gabor response.
    pub min_ridge_strength: f64,
    /// Minimum raw Laplacian variance.
    pub min_laplacian_variance: f64,
    pub min_histogram_peaks: usize,
    /// Minimum normalized mass for a histogram peak to count.
    pub min_peak_mass: f64,
    pub min_edge_density: f64,
    pub max_edge_density: f64,
    pub canny_low: f32,
    pub canny_high: f32,
    pub gabor: GaborParams,
}

impl Default for ValidationThresholds {
    fn default() -> Self {
        Self {
            min_aspect_ratio: 0.3,
            max_aspect_ratio: 3.0,
            min_brightness: 30.0,
            max_brightness: 220.0,
            min_std: 20.0,
            min_ridge_strength: 15.0,
            min_laplacian_variance: 50.0,
            min_histogram_peaks: 2,
            min_peak_mass: 0.01,
            min_edge_density: 0.05,
            max_edge_density: 0.4,
            canny_low: 50.0,
            canny_high: 150.0,
            gabor: GaborParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Upper bound on keypoints kept per sample.
    pub max_keypoints: usize,
    /// FAST intensity threshold.
    pub fast_threshold: u8,
    /// Number of pyramid levels including the base image.
    pub pyramid_levels: usize,
    /// Downscale factor between consecutive levels.
    pub pyramid_scale: f32,
    /// Non-maximum suppression radius (pixels, per level).
    pub nms_radius: u32,
    /// Descriptor components retained per keypoint.
    pub stored_descriptor_len: usize,
    /// Gaussian sigma of the enhancement smoothing pass.
    pub smoothing_sigma: f32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_keypoints: 500,
            fast_threshold: 20,
            pyramid_levels: 3,
            pyramid_scale: 1.5,
            nms_radius: 3,
            stored_descriptor_len: 10,
            smoothing_sigma: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub threshold: f64,
    pub size_weight: f64,
    pub hash_weight: f64,
    pub content_weight: f64,
    /// Leading bytes compared position by position.
    pub content_prefix_len: usize,
    /// Cap on the doubled content similarity.
    pub content_cap: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.75,
            size_weight: 0.2,
            hash_weight: 0.8,
            content_weight: 0.3,
            content_prefix_len: 1000,
            content_cap: 0.7,
        }
    }
}

// ═══════════════════════════════════════════════════════════
// GateConfig
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    pub dimensions: DimensionLimits,
    pub quality: QualityConfig,
    pub validation: ValidationThresholds,
    pub features: FeatureConfig,
    pub matching: MatchConfig,
}

impl GateConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject settings that would make a stage meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.dimensions;
        if d.min_side == 0 || d.validation_min_side == 0 {
            return Err(invalid("minimum side lengths must be positive"));
        }
        if d.validation_min_side > d.validation_max_side {
            return Err(invalid("validation_min_side exceeds validation_max_side"));
        }
        if d.validation_max_side > d.intake_max_side {
            return Err(invalid("validation_max_side exceeds intake_max_side"));
        }

        let q = &self.quality;
        if (q.weights.sum() - 1.0).abs() > 1e-6 {
            return Err(invalid(&format!(
                "quality weights must sum to 1.0, got {:.6}",
                q.weights.sum()
            )));
        }
        if q.sharpness_normalizer <= 0.0 {
            return Err(invalid("sharpness_normalizer must be positive"));
        }

        let v = &self.validation;
        if v.min_aspect_ratio <= 0.0 || v.min_aspect_ratio > v.max_aspect_ratio {
            return Err(invalid("aspect ratio band is empty or non-positive"));
        }
        if v.min_brightness > v.max_brightness {
            return Err(invalid("brightness band is inverted"));
        }
        if v.min_edge_density > v.max_edge_density {
            return Err(invalid("edge density band is inverted"));
        }
        if v.canny_low > v.canny_high {
            return Err(invalid("canny_low exceeds canny_high"));
        }
        if v.gabor.size % 2 == 0 || v.gabor.sigma <= 0.0 || v.gabor.lambda <= 0.0 {
            return Err(invalid("gabor kernel needs an odd size and positive sigma/lambda"));
        }

        let f = &self.features;
        if f.pyramid_levels == 0 || f.pyramid_scale <= 1.0 {
            return Err(invalid("pyramid needs at least one level and a scale above 1"));
        }
        if f.smoothing_sigma <= 0.0 {
            return Err(invalid("smoothing_sigma must be positive"));
        }

        let m = &self.matching;
        if m.threshold <= 0.0 || m.threshold > 1.0 {
            return Err(invalid("match threshold must lie in (0, 1]"));
        }
        if m.content_prefix_len == 0 {
            return Err(invalid("content_prefix_len must be positive"));
        }

        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        GateConfig::default().validate().unwrap();
    }

    #[test]
    fn default_constants_match_production() {
        let c = GateConfig::default();
        assert_eq!(c.dimensions.min_side, 100);
        assert_eq!(c.dimensions.validation_max_side, 2000);
        assert_eq!(c.dimensions.intake_max_side, 5000);
        assert_eq!(c.validation.min_brightness, 30.0);
        assert_eq!(c.validation.max_brightness, 220.0);
        assert_eq!(c.validation.min_std, 20.0);
        assert_eq!(c.validation.min_ridge_strength, 15.0);
        assert_eq!(c.validation.min_laplacian_variance, 50.0);
        assert_eq!(c.matching.threshold, 0.75);
        assert_eq!(c.quality.weights, QualityWeights::default());
    }

    #[test]
    fn partial_json_overrides_only_named_fields() {
        let json = r#"{ "matching": { "threshold": 0.9 }, "validation": { "min_std": 25.0 } }"#;
        let c = GateConfig::from_json_str(json).unwrap();
        assert_eq!(c.matching.threshold, 0.9);
        assert_eq!(c.matching.size_weight, 0.2);
        assert_eq!(c.validation.min_std, 25.0);
        assert_eq!(c.validation.max_brightness, 220.0);
    }

    #[test]
    fn json_round_trip_preserves_config() {
        let c = GateConfig::default();
        let json = c.to_json_string().unwrap();
        assert_eq!(GateConfig::from_json_str(&json).unwrap(), c);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let json = r#"{ "quality": { "weights": { "contrast": 0.5 } } }"#;
        let err = GateConfig::from_json_str(json).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn inverted_brightness_band_rejected() {
        let mut c = GateConfig::default();
        c.validation.min_brightness = 230.0;
        assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn even_gabor_kernel_rejected() {
        let mut c = GateConfig::default();
        c.validation.gabor.size = 20;
        assert!(c.validate().is_err());
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            GateConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn presets_match_call_sites() {
        assert_eq!(thresholds::VERIFY, 0.3);
        assert_eq!(thresholds::ENROLL, 0.7);
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }

    #[test]
    fn app_name_is_ridgegate() {
        assert_eq!(APP_NAME, "ridgegate");
    }
}

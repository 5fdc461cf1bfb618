//! Capture quality scoring.
//!
//! [`QualityAssessor`] is read-only analysis over an intensity grid. It never
//! modifies the image and never fails: a fault inside a filter yields the
//! configured fallback score instead.

pub mod metrics;

use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use self::metrics::{intensity_stats, laplacian_variance, median_residual, snr_db, EPSILON};
use super::diagnostic::{default_sink, DiagnosticEvent, DiagnosticSink, SharedSink, Stage};
use super::guard::run_guarded;
use crate::config::QualityConfig;

/// Weighted quality score and the normalized components it was built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    /// Combined score in [0, 1].
    pub score: f64,
    /// std / 255.
    pub contrast: f64,
    /// Laplacian variance over the normalizer, capped at 1.
    pub sharpness: f64,
    /// 1.0 at mid-gray, 0.0 at pure black or white.
    pub brightness: f64,
    /// 1 - normalized median residual.
    pub noise: f64,
}

impl QualityScore {
    /// Score with no component breakdown (undersized grid, internal fault).
    pub fn fixed(score: f64) -> Self {
        Self {
            score,
            contrast: 0.0,
            sharpness: 0.0,
            brightness: 0.0,
            noise: 0.0,
        }
    }

    pub fn meets(&self, threshold: f64) -> bool {
        self.score >= threshold
    }
}

/// Raw diagnostic metrics. Unnormalized; every value is finite.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub mean_intensity: f64,
    pub std_intensity: f64,
    /// Coefficient of variation: std / (mean + 1e-6).
    pub contrast: f64,
    /// Raw Laplacian variance.
    pub sharpness: f64,
    /// Mean absolute median residual over 255.
    pub noise_level: f64,
    pub snr_db: f64,
}

/// Assesses capture quality without modifying the grid.
pub trait QualityAssessor: Send + Sync {
    /// Combined [0, 1] quality score.
    fn score(&self, grid: &GrayImage) -> QualityScore;

    /// Threshold-free diagnostic metrics.
    fn metrics(&self, grid: &GrayImage) -> QualityMetrics;
}

// ── WeightedQualityAssessor ───────────────────────────────

/// Weighted sum of contrast, sharpness, brightness balance and noise.
pub struct WeightedQualityAssessor {
    config: QualityConfig,
    /// Either side below this pins the score to `undersized_score`.
    min_side: u32,
    sink: SharedSink,
}

impl Default for WeightedQualityAssessor {
    fn default() -> Self {
        Self::new(QualityConfig::default(), 100)
    }
}

impl WeightedQualityAssessor {
    pub fn new(config: QualityConfig, min_side: u32) -> Self {
        Self {
            config,
            min_side,
            sink: default_sink(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    fn compute_score(&self, grid: &GrayImage) -> QualityScore {
        let (w, h) = grid.dimensions();
        if w < self.min_side || h < self.min_side {
            debug!(width = w, height = h, "Grid below minimum side, pinning quality score");
            return QualityScore::fixed(self.config.undersized_score);
        }

        let stats = intensity_stats(grid);
        let contrast = stats.std / 255.0;
        let sharpness =
            (laplacian_variance(grid) / self.config.sharpness_normalizer).clamp(0.0, 1.0);
        let brightness = 1.0 - (stats.mean / 255.0 - 0.5).abs() * 2.0;
        let noise_level = median_residual(grid, self.config.median_radius).mean_abs / 255.0;
        let noise = (1.0 - noise_level).max(0.0);

        let weights = &self.config.weights;
        let score = (contrast * weights.contrast
            + sharpness * weights.sharpness
            + brightness * weights.brightness
            + noise * weights.noise)
            .clamp(0.0, 1.0);

        QualityScore {
            score,
            contrast,
            sharpness,
            brightness,
            noise,
        }
    }

    fn compute_metrics(&self, grid: &GrayImage) -> QualityMetrics {
        if grid.width() == 0 || grid.height() == 0 {
            return QualityMetrics::default();
        }

        let stats = intensity_stats(grid);
        let residual = median_residual(grid, self.config.median_radius);

        QualityMetrics {
            mean_intensity: stats.mean,
            std_intensity: stats.std,
            contrast: stats.std / (stats.mean + EPSILON),
            sharpness: laplacian_variance(grid),
            noise_level: residual.mean_abs / 255.0,
            snr_db: snr_db(stats.variance(), residual.mse),
        }
    }
}

impl QualityAssessor for WeightedQualityAssessor {
    fn score(&self, grid: &GrayImage) -> QualityScore {
        let fallback = self.config.fallback_score;
        let result = run_guarded(
            Stage::Quality,
            self.sink.as_ref(),
            || QualityScore::fixed(fallback),
            || self.compute_score(grid),
        );

        self.sink.record(DiagnosticEvent::QualityScored {
            score: result.score,
            contrast: result.contrast,
            sharpness: result.sharpness,
            brightness: result.brightness,
            noise: result.noise,
        });
        result
    }

    fn metrics(&self, grid: &GrayImage) -> QualityMetrics {
        run_guarded(
            Stage::Quality,
            self.sink.as_ref(),
            QualityMetrics::default,
            || self.compute_metrics(grid),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::diagnostic::{MemorySink, NullSink};
    use crate::test_support::ridge_image;
    use image::Luma;

    fn assessor() -> WeightedQualityAssessor {
        WeightedQualityAssessor::default().with_sink(Arc::new(NullSink))
    }

    #[test]
    fn uniform_mid_gray_scores_low() {
        let grid = GrayImage::from_pixel(100, 100, Luma([128]));
        let q = assessor().score(&grid);
        assert_eq!(q.contrast, 0.0);
        assert_eq!(q.sharpness, 0.0);
        assert!(q.score < 0.5, "score {}", q.score);
        assert!(!q.meets(crate::config::thresholds::ENROLL));
    }

    #[test]
    fn undersized_grid_is_pinned() {
        let grid = ridge_image(99, 300, 10.0);
        assert_eq!(assessor().score(&grid).score, 0.1);
    }

    #[test]
    fn ridges_score_above_flat_gray() {
        let a = assessor();
        let ridges = a.score(&ridge_image(300, 300, 10.0));
        let flat = a.score(&GrayImage::from_pixel(300, 300, Luma([128])));
        assert!(ridges.score > flat.score);
        assert!(ridges.contrast > 0.15);
    }

    #[test]
    fn score_is_bounded_for_extremes() {
        let a = assessor();
        for grid in [
            GrayImage::from_pixel(120, 120, Luma([0])),
            GrayImage::from_pixel(120, 120, Luma([255])),
            GrayImage::from_fn(120, 120, |x, y| Luma([if (x + y) % 2 == 0 { 0 } else { 255 }])),
        ] {
            let q = a.score(&grid);
            assert!((0.0..=1.0).contains(&q.score), "score {}", q.score);
        }
    }

    #[test]
    fn black_grid_has_zero_brightness_component() {
        let q = assessor().score(&GrayImage::from_pixel(120, 120, Luma([0])));
        assert_eq!(q.brightness, 0.0);
    }

    #[test]
    fn assessment_is_idempotent() {
        let a = assessor();
        let grid = ridge_image(256, 200, 9.0);
        assert_eq!(a.score(&grid), a.score(&grid));
        assert_eq!(a.metrics(&grid), a.metrics(&grid));
    }

    #[test]
    fn metrics_are_finite_for_uniform_grid() {
        let m = assessor().metrics(&GrayImage::from_pixel(100, 100, Luma([128])));
        assert_eq!(m.mean_intensity, 128.0);
        assert_eq!(m.std_intensity, 0.0);
        assert_eq!(m.snr_db, metrics::SNR_CAP_DB);
        assert!(m.contrast.is_finite());
    }

    #[test]
    fn metrics_guard_black_division() {
        let m = assessor().metrics(&GrayImage::from_pixel(100, 100, Luma([0])));
        assert_eq!(m.contrast, 0.0);
    }

    #[test]
    fn empty_grid_metrics_default() {
        assert_eq!(assessor().metrics(&GrayImage::new(0, 0)), QualityMetrics::default());
    }

    #[test]
    fn score_is_reported_to_sink() {
        let sink = Arc::new(MemorySink::new());
        let a = WeightedQualityAssessor::default().with_sink(sink.clone());
        a.score(&GrayImage::from_pixel(100, 100, Luma([128])));
        assert!(matches!(
            sink.events().as_slice(),
            [DiagnosticEvent::QualityScored { contrast, .. }] if *contrast == 0.0
        ));
    }
}

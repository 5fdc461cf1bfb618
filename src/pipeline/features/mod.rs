//! Feature extraction: enhancement followed by oriented keypoint detection.
//!
//! Extraction never fails. A grid with no usable structure, or a detector
//! fault, yields an empty [`FeatureSet`]; deciding whether that is enough is
//! the caller's business.

pub mod enhance;
pub mod keypoints;
pub mod template;

pub use keypoints::Keypoint;
pub use template::EnrollmentTemplate;

use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use self::enhance::enhance;
use self::keypoints::detect_keypoints;
use super::diagnostic::{default_sink, DiagnosticEvent, DiagnosticSink, SharedSink, Stage};
use super::guard::run_guarded;
use crate::config::FeatureConfig;

/// Keypoints of one sample, strongest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub keypoints: Vec<Keypoint>,
}

impl FeatureSet {
    pub fn len(&self) -> usize {
        self.keypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoints.is_empty()
    }

    /// At least `min_count` keypoints.
    pub fn is_sufficient(&self, min_count: usize) -> bool {
        self.len() >= min_count
    }
}

/// Turns an intensity grid into a bounded keypoint set.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, grid: &GrayImage) -> FeatureSet;
}

// ── KeypointFeatureExtractor ──────────────────────────────

pub struct KeypointFeatureExtractor {
    config: FeatureConfig,
    sink: SharedSink,
}

impl Default for KeypointFeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

impl KeypointFeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            sink: default_sink(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }
}

impl FeatureExtractor for KeypointFeatureExtractor {
    fn extract(&self, grid: &GrayImage) -> FeatureSet {
        let set = run_guarded(
            Stage::Features,
            self.sink.as_ref(),
            FeatureSet::default,
            || {
                let enhanced = enhance(grid, self.config.smoothing_sigma);
                FeatureSet {
                    keypoints: detect_keypoints(&enhanced, &self.config),
                }
            },
        );

        debug!(
            width = grid.width(),
            height = grid.height(),
            count = set.len(),
            "Features extracted"
        );
        self.sink
            .record(DiagnosticEvent::FeaturesExtracted { count: set.len() });
        set
    }
}

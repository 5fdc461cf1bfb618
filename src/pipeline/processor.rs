//! Sample processing orchestrator.
//!
//! Single entry point that drives a submitted capture through the stages:
//! decode → quality gate → content validation → features → template.
//!
//! Engines sit behind traits (`QualityAssessor`, `FeatureExtractor`) so the
//! orchestrator can be tested with stub implementations.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::compare::{ComparisonResult, Comparator, SampleDigest};
use super::diagnostic::{default_sink, DiagnosticEvent, DiagnosticSink, SharedSink, Stage};
use super::features::{EnrollmentTemplate, FeatureExtractor, FeatureSet, KeypointFeatureExtractor};
use super::guard::run_guarded;
use super::intake::decode::{decode_payload, DecodedSample};
use super::intake::format::ImageFormat;
use super::intake::hash::generate_sample_id;
use super::quality::{QualityAssessor, QualityMetrics, QualityScore, WeightedQualityAssessor};
use super::validation::{ContentValidator, ValidationVerdict};
use super::BiometricError;
use crate::config::GateConfig;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Accept/reject decision for a capture, without feature extraction.
#[derive(Debug, Clone, Serialize)]
pub struct SampleAssessment {
    pub accepted: bool,
    pub quality_score: f64,
    pub metrics: QualityMetrics,
    /// First failing rule, user-facing. `None` when accepted.
    pub reason: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// Everything produced for an accepted capture.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedSample {
    pub sample_id: String,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub quality: QualityScore,
    pub features: FeatureSet,
    pub template: EnrollmentTemplate,
    /// `template` in its storable base64 form.
    pub encoded_template: String,
}

/// Minimums a capture must meet to count as a verifiable fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VerificationPolicy {
    pub min_features: usize,
    pub min_quality: f64,
    pub min_height: u32,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            min_features: 10,
            min_quality: crate::config::thresholds::VERIFY,
            min_height: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub verified: bool,
    pub message: String,
    pub quality_score: Option<f64>,
    pub feature_count: Option<usize>,
    /// Size of the submitted payload.
    pub byte_len: usize,
    /// Machine-readable code of the processing error, if any.
    pub error_code: Option<&'static str>,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct SampleProcessor {
    config: GateConfig,
    quality: Box<dyn QualityAssessor>,
    validator: ContentValidator,
    extractor: Box<dyn FeatureExtractor>,
    comparator: Comparator,
    sink: SharedSink,
}

impl Default for SampleProcessor {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

impl SampleProcessor {
    pub fn new(config: GateConfig) -> Self {
        Self::with_sink(config, default_sink())
    }

    /// Build the production stages, all reporting to `sink`.
    pub fn with_sink(config: GateConfig, sink: Arc<dyn DiagnosticSink>) -> Self {
        let quality =
            WeightedQualityAssessor::new(config.quality.clone(), config.dimensions.min_side)
                .with_sink(sink.clone());
        let validator = ContentValidator::new(config.validation.clone(), &config.dimensions)
            .with_sink(sink.clone());
        let extractor =
            KeypointFeatureExtractor::new(config.features.clone()).with_sink(sink.clone());
        let comparator = Comparator::new(config.matching.clone()).with_sink(sink.clone());

        Self {
            config,
            quality: Box::new(quality),
            validator,
            extractor: Box::new(extractor),
            comparator,
            sink,
        }
    }

    pub fn with_assessor(mut self, quality: Box<dyn QualityAssessor>) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_extractor(mut self, extractor: Box<dyn FeatureExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn comparator(&self) -> &Comparator {
        &self.comparator
    }

    /// Decode a payload and enforce the hard intake cap.
    pub fn decode(&self, payload: &[u8]) -> Result<DecodedSample, BiometricError> {
        let decoded = run_guarded(
            Stage::Decode,
            self.sink.as_ref(),
            || Err(BiometricError::Decode("decoder fault".into())),
            || decode_payload(payload, self.config.dimensions.intake_max_side),
        )?;

        let (width, height) = decoded.grid.dimensions();

        self.sink.record(DiagnosticEvent::Decoded {
            width,
            height,
            native_gray: decoded.native_gray,
        });
        Ok(decoded)
    }

    /// Quality score plus content verdict. Rejections are reported in the
    /// result; only undecodable input is an error.
    pub fn assess(&self, payload: &[u8], threshold: f64) -> Result<SampleAssessment, BiometricError> {
        let decoded = self.decode(payload)?;
        let grid = &decoded.grid;

        let score = self.quality.score(grid);
        let metrics = self.quality.metrics(grid);

        let reason = if !score.meets(threshold) {
            Some(
                BiometricError::QualityTooLow {
                    score: score.score,
                    threshold,
                }
                .to_string(),
            )
        } else {
            let verdict = self.validator.validate(grid);
            verdict.reason.map(|r| r.message().to_string())
        };

        Ok(SampleAssessment {
            accepted: reason.is_none(),
            quality_score: score.score,
            metrics,
            reason,
            width: grid.width(),
            height: grid.height(),
        })
    }

    /// Content verdict for a payload, with the per-check record.
    pub fn validate_content(&self, payload: &[u8]) -> Result<ValidationVerdict, BiometricError> {
        let decoded = self.decode(payload)?;
        Ok(self.validator.validate(&decoded.grid))
    }

    /// Full pipeline. Every gate failure is an error.
    pub fn process(&self, payload: &[u8], threshold: f64) -> Result<ProcessedSample, BiometricError> {
        let decoded = self.decode(payload)?;
        let grid = &decoded.grid;
        let (width, height) = grid.dimensions();

        let min = self.config.dimensions.min_side;
        if width < min || height < min {
            return Err(BiometricError::Dimension {
                stage: "features",
                width,
                height,
                min,
                max: self.config.dimensions.intake_max_side,
            });
        }

        let quality = self.quality.score(grid);
        if !quality.meets(threshold) {
            warn!(score = quality.score, threshold, "Sample below quality threshold");
            return Err(BiometricError::QualityTooLow {
                score: quality.score,
                threshold,
            });
        }

        let verdict = self.validator.validate(grid);
        if let Some(reason) = verdict.reason {
            return Err(BiometricError::ContentRejected(reason));
        }

        let features = self.extractor.extract(grid);
        let template = EnrollmentTemplate::from_sample(grid, &features);
        let encoded_template = template.encode()?;

        info!(
            quality = quality.score,
            features = features.len(),
            width,
            height,
            "Sample processed"
        );

        Ok(ProcessedSample {
            sample_id: generate_sample_id(),
            format: decoded.format,
            width,
            height,
            quality,
            features,
            template,
            encoded_template,
        })
    }

    /// Process at `policy.min_quality`, then require enough features and
    /// height. Never errors: failures land in the outcome message.
    pub fn verify_sample(&self, payload: &[u8], policy: &VerificationPolicy) -> VerificationOutcome {
        let byte_len = payload.len();

        let sample = match self.process(payload, policy.min_quality) {
            Ok(sample) => sample,
            Err(e) => {
                return VerificationOutcome {
                    verified: false,
                    message: format!("Fingerprint processing failed: {e}"),
                    quality_score: match e {
                        BiometricError::QualityTooLow { score, .. } => Some(score),
                        _ => None,
                    },
                    feature_count: None,
                    byte_len,
                    error_code: Some(e.code()),
                }
            }
        };

        let feature_count = sample.features.len();
        let verified = sample.features.is_sufficient(policy.min_features)
            && sample.quality.meets(policy.min_quality)
            && sample.height >= policy.min_height;

        let message = if verified {
            "Fingerprint verification completed"
        } else {
            "Image does not appear to be a valid fingerprint. Please upload a clear fingerprint image."
        };

        VerificationOutcome {
            verified,
            message: message.to_string(),
            quality_score: Some(sample.quality.score),
            feature_count: Some(feature_count),
            byte_len,
            error_code: None,
        }
    }

    /// Byte-level comparison of two submitted payloads.
    pub fn compare(&self, stored: &[u8], current: &[u8]) -> ComparisonResult {
        self.comparator.compare_bytes(stored, current)
    }

    pub fn compare_digests(&self, stored: &SampleDigest, current: &SampleDigest) -> ComparisonResult {
        self.comparator.compare_digests(stored, current)
    }
}

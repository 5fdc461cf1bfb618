//! Content validation: does this grid plausibly show a fingerprint?
//!
//! Conservative heuristic gatekeeping, not a biometric classifier. Checks run
//! in a fixed order and the first failure decides the verdict. Callers must
//! tolerate both false rejections and false acceptances.

pub mod checks;
pub mod edges;
pub mod histogram;
pub mod ridge;

use std::sync::Arc;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use self::checks::{standard_checks, CheckContext, NamedCheck};
use super::diagnostic::{default_sink, DiagnosticEvent, DiagnosticSink, SharedSink, Stage};
use super::guard::run_guarded;
use crate::config::{DimensionLimits, ValidationThresholds};

/// Why a grid was refused. One per check, plus the fail-closed fault case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    AspectRatio,
    TooSmall,
    TooLarge,
    BrightnessOutOfRange,
    InsufficientContrast,
    NoRidgePattern,
    TooSmooth,
    NoRidgeValleyHistogram,
    EdgeDensityOutOfRange,
    /// A check faulted internally; the grid is refused rather than trusted.
    InternalFault,
}

impl RejectionReason {
    pub fn code(&self) -> &'static str {
        match self {
            Self::AspectRatio => "aspect_ratio",
            Self::TooSmall => "too_small",
            Self::TooLarge => "too_large",
            Self::BrightnessOutOfRange => "brightness_out_of_range",
            Self::InsufficientContrast => "insufficient_contrast",
            Self::NoRidgePattern => "no_ridge_pattern",
            Self::TooSmooth => "too_smooth",
            Self::NoRidgeValleyHistogram => "no_ridge_valley_histogram",
            Self::EdgeDensityOutOfRange => "edge_density_out_of_range",
            Self::InternalFault => "internal_fault",
        }
    }

    /// User-facing explanation.
    pub fn message(&self) -> &'static str {
        match self {
            Self::AspectRatio => "Image dimensions don't match fingerprint characteristics. Fingerprints are typically elongated.",
            Self::TooSmall => "Image is too small. Please upload a higher resolution fingerprint image.",
            Self::TooLarge => "Image is too large. Please upload a smaller fingerprint image.",
            Self::BrightnessOutOfRange => "Image brightness doesn't match fingerprint characteristics. Please ensure proper lighting.",
            Self::InsufficientContrast => "Image lacks sufficient contrast. Please ensure the fingerprint ridges are clearly visible.",
            Self::NoRidgePattern => "No clear ridge patterns detected. Please upload a clear fingerprint image with visible ridges.",
            Self::TooSmooth => "Image appears to be too smooth. Please upload a clear fingerprint image with visible texture.",
            Self::NoRidgeValleyHistogram => "Image doesn't show typical fingerprint ridge/valley patterns. Please upload a clear fingerprint image.",
            Self::EdgeDensityOutOfRange => "Edge patterns don't match fingerprint characteristics. Please upload a clear fingerprint image.",
            Self::InternalFault => "Fingerprint validation failed: internal error while analysing the image.",
        }
    }
}

/// One evaluated check.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckRecord {
    pub check: &'static str,
    pub measured: f64,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    pub reason: Option<RejectionReason>,
    /// Checks that actually ran, in order. Stops at the first failure.
    pub evaluated: Vec<CheckRecord>,
}

impl ValidationVerdict {
    fn rejected(reason: RejectionReason, evaluated: Vec<CheckRecord>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            evaluated,
        }
    }

    /// User-facing message for the verdict.
    pub fn message(&self) -> &'static str {
        match self.reason {
            Some(reason) => reason.message(),
            None => "Valid fingerprint image detected",
        }
    }
}

// ═══════════════════════════════════════════════════════════
// ContentValidator
// ═══════════════════════════════════════════════════════════

pub struct ContentValidator {
    thresholds: ValidationThresholds,
    min_side: u32,
    max_side: u32,
    checks: Vec<NamedCheck>,
    sink: SharedSink,
}

impl Default for ContentValidator {
    fn default() -> Self {
        Self::new(ValidationThresholds::default(), &DimensionLimits::default())
    }
}

impl ContentValidator {
    pub fn new(thresholds: ValidationThresholds, limits: &DimensionLimits) -> Self {
        Self {
            thresholds,
            min_side: limits.validation_min_side,
            max_side: limits.validation_max_side,
            checks: standard_checks(),
            sink: default_sink(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn checks(&self) -> &[NamedCheck] {
        &self.checks
    }

    /// Run the checks in order. Never panics: a faulting check rejects the
    /// grid with [`RejectionReason::InternalFault`].
    pub fn validate(&self, grid: &GrayImage) -> ValidationVerdict {
        let verdict = run_guarded(
            Stage::Validation,
            self.sink.as_ref(),
            || ValidationVerdict::rejected(RejectionReason::InternalFault, Vec::new()),
            || self.run_checks(grid),
        );

        match verdict.reason {
            None => {
                self.sink.record(DiagnosticEvent::ContentAccepted);
                info!(
                    width = grid.width(),
                    height = grid.height(),
                    checks = verdict.evaluated.len(),
                    "Fingerprint content accepted"
                );
            }
            Some(reason) => {
                self.sink.record(DiagnosticEvent::ContentRejected { reason });
                warn!(
                    reason = reason.code(),
                    width = grid.width(),
                    height = grid.height(),
                    "Fingerprint content rejected"
                );
            }
        }
        verdict
    }

    fn run_checks(&self, grid: &GrayImage) -> ValidationVerdict {
        let ctx = CheckContext {
            thresholds: &self.thresholds,
            min_side: self.min_side,
            max_side: self.max_side,
        };

        let mut evaluated = Vec::with_capacity(self.checks.len());
        for check in &self.checks {
            let outcome = (check.run)(grid, &ctx);
            self.sink.record(DiagnosticEvent::CheckEvaluated {
                check: check.name,
                measured: outcome.measured,
                passed: outcome.passed(),
            });
            evaluated.push(CheckRecord {
                check: check.name,
                measured: outcome.measured,
                passed: outcome.passed(),
            });

            if let Some(reason) = outcome.rejection {
                return ValidationVerdict::rejected(reason, evaluated);
            }
        }

        ValidationVerdict {
            accepted: true,
            reason: None,
            evaluated,
        }
    }
}

pub mod diagnostic;
pub mod guard;
pub mod intake;
pub mod quality;
pub mod validation;
pub mod features;
pub mod compare;
pub mod processor;

pub use compare::*;
pub use diagnostic::*;
pub use features::*;
pub use intake::*;
pub use processor::*;
pub use quality::*;
pub use validation::*;

use thiserror::Error;

/// Failures and business-rule verdicts surfaced by the pipeline.
///
/// An empty feature set is not represented here: extraction always succeeds,
/// possibly with zero keypoints.
#[derive(Error, Debug)]
pub enum BiometricError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Invalid base64 data: {0}")]
    Encoding(String),

    #[error("Image dimensions {width}x{height} outside the {stage} band ({min}..={max})")]
    Dimension {
        stage: &'static str,
        width: u32,
        height: u32,
        min: u32,
        max: u32,
    },

    #[error("Fingerprint quality too low: {score:.2} < {threshold}")]
    QualityTooLow { score: f64, threshold: f64 },

    #[error("{}", .0.message())]
    ContentRejected(RejectionReason),

    #[error("Invalid enrollment template: {0}")]
    Template(String),
}

impl BiometricError {
    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io_error",
            Self::Decode(_) => "decode_error",
            Self::Encoding(_) => "encoding_error",
            Self::Dimension { .. } => "dimension_error",
            Self::QualityTooLow { .. } => "quality_too_low",
            Self::ContentRejected(reason) => reason.code(),
            Self::Template(_) => "template_error",
        }
    }

    /// Business-rule verdicts, as opposed to malformed input.
    pub fn is_verdict(&self) -> bool {
        matches!(self, Self::QualityTooLow { .. } | Self::ContentRejected(_))
    }
}

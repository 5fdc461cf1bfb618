//! Fingerprint sample intake.
//!
//! Submitted captures go through five synchronous stages:
//! decode → quality score → content validation → keypoint features →
//! byte-level comparison. [`pipeline::SampleProcessor`] wires them together;
//! every stage is also usable on its own.
//!
//! Nothing here touches global state. Diagnostics flow into an injected
//! [`pipeline::DiagnosticSink`], and logging goes through `tracing` without
//! installing a subscriber (see [`config::init_tracing`] for hosts that want
//! one).

pub mod config;
pub mod pipeline;

#[cfg(test)]
mod test_support;

pub use config::GateConfig;
pub use pipeline::{
    BiometricError, ComparisonResult, ContentValidator, FeatureSet, RejectionReason,
    SampleProcessor,
};

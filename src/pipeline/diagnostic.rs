//! Diagnostic sink: where pipeline stages report what they measured.
//!
//! Stages never reach for a global logger or dump directory. They receive a
//! sink at construction time and push [`DiagnosticEvent`]s into it:
//! - [`TracingSink`] (default) forwards events to `tracing`
//! - [`NullSink`] drops everything
//! - [`MemorySink`] keeps events in memory for inspection in tests or
//!   debugging endpoints
//!
//! The host decides where `tracing` output goes; this crate never installs a
//! subscriber on its own.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use super::validation::RejectionReason;

/// Pipeline stage, used to tag events and fault reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Decode,
    Quality,
    Validation,
    Features,
    Compare,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Quality => "quality",
            Self::Validation => "validation",
            Self::Features => "features",
            Self::Compare => "compare",
        }
    }
}

/// One observation emitted by a stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    Decoded {
        width: u32,
        height: u32,
        native_gray: bool,
    },
    QualityScored {
        score: f64,
        contrast: f64,
        sharpness: f64,
        brightness: f64,
        noise: f64,
    },
    CheckEvaluated {
        check: &'static str,
        measured: f64,
        passed: bool,
    },
    ContentAccepted,
    ContentRejected {
        reason: RejectionReason,
    },
    FeaturesExtracted {
        count: usize,
    },
    Compared {
        score: f64,
        is_match: bool,
    },
    StageFault {
        stage: Stage,
        message: String,
    },
}

/// Receives diagnostic events. Implementations must tolerate concurrent calls.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}

/// Shared handle passed to every service.
pub type SharedSink = Arc<dyn DiagnosticSink>;

/// Default sink for services constructed without an explicit one.
pub fn default_sink() -> SharedSink {
    Arc::new(TracingSink)
}

// ── TracingSink ───────────────────────────────────────────

/// Forwards events to `tracing`. Faults log at `warn`, measurements at `debug`.
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::StageFault { stage, message } => tracing::warn!(
                stage = stage.as_str(),
                error = %message,
                "Stage faulted, failing closed"
            ),
            DiagnosticEvent::CheckEvaluated {
                check,
                measured,
                passed,
            } => tracing::debug!(check, measured, passed, "Content check evaluated"),
            other => tracing::debug!(event = ?other, "Diagnostic event"),
        }
    }
}

// ── NullSink ──────────────────────────────────────────────

pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn record(&self, _event: DiagnosticEvent) {}
}

// ── MemorySink ────────────────────────────────────────────

/// Collects events in order. Per-instance storage only.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl DiagnosticSink for MemorySink {
    fn record(&self, event: DiagnosticEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

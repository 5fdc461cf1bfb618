//! Fail-closed stage boundary.
//!
//! A malformed upload must never take the host process down. Each stage runs
//! inside [`run_guarded`]; a panic from a decoder or filter is caught,
//! reported to the sink, and replaced by the stage's safe fallback.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::diagnostic::{DiagnosticEvent, DiagnosticSink, Stage};

/// Run `work`, returning `fallback()` if it panics.
///
/// The closures only touch values owned by the current call, so unwinding
/// cannot leave shared state half-updated.
pub fn run_guarded<T>(
    stage: Stage,
    sink: &dyn DiagnosticSink,
    fallback: impl FnOnce() -> T,
    work: impl FnOnce() -> T,
) -> T {
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(value) => value,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            sink.record(DiagnosticEvent::StageFault { stage, message });
            fallback()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::diagnostic::MemorySink;

    #[test]
    fn passes_through_success() {
        let sink = MemorySink::new();
        let v = run_guarded(Stage::Quality, &sink, || 0.5, || 0.9);
        assert_eq!(v, 0.9);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn panic_becomes_fallback_and_fault_event() {
        let sink = MemorySink::new();
        let v: Vec<u32> = run_guarded(Stage::Features, &sink, Vec::new, || panic!("filter exploded"));
        assert!(v.is_empty());

        let events = sink.events();
        assert_eq!(events.len(), 1);
        match &events[0] {
            DiagnosticEvent::StageFault { stage, message } => {
                assert_eq!(*stage, Stage::Features);
                assert!(message.contains("filter exploded"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn formatted_panic_message_is_captured() {
        let sink = MemorySink::new();
        let _ = run_guarded(Stage::Decode, &sink, || (), || {
            let n = 3;
            panic!("bad chunk {n}")
        });
        assert!(matches!(
            &sink.events()[0],
            DiagnosticEvent::StageFault { message, .. } if message == "bad chunk 3"
        ));
    }
}

//! Maps `Box<dyn Error>` from trait boundaries to the typed `CommunicationError`.
//!
//! The traits in `mixplant_traits` use `Box<dyn Error + Send + Sync>` so any
//! transport can plug in; this module converts those to our typed error, with
//! an optional feature-gated path for `mixplant_sim::SimError` downcasting.

use crate::error::{CommunicationError, FailureKind, RemoteOp};

/// Map a trait-boundary error to a typed `CommunicationError`.
///
/// Attempts to downcast known backend error types first, then falls back
/// to string-based heuristics.
pub fn map_remote_error(
    op: RemoteOp,
    target: &str,
    e: &(dyn std::error::Error + 'static),
) -> CommunicationError {
    if let Some(ce) = e.downcast_ref::<CommunicationError>() {
        return ce.clone();
    }

    // Feature-gated: try to downcast to SimError for precise mapping
    #[cfg(feature = "sim-errors")]
    {
        use mixplant_sim::error::SimError;
        if let Some(sim) = e.downcast_ref::<SimError>() {
            let kind = match sim {
                SimError::NoSuchDevice(_)
                | SimError::NoSuchVariable { .. }
                | SimError::NoSuchCommand { .. }
                | SimError::Offline(_) => FailureKind::Unreachable,
                SimError::ReadOnly(_) | SimError::OutOfRange(_) => FailureKind::Rejected,
                SimError::TypeMismatch(_) => FailureKind::Malformed,
                SimError::Poisoned => FailureKind::Other,
            };
            return CommunicationError::new(op, target, kind, sim.to_string());
        }
    }

    // Fallback: string-based detection
    let s = e.to_string();
    let lower = s.to_lowercase();
    let kind = if lower.contains("timeout")
        || lower.contains("unreachable")
        || lower.contains("offline")
        || lower.contains("not found")
    {
        FailureKind::Unreachable
    } else if lower.contains("read-only") || lower.contains("rejected") || lower.contains("range") {
        FailureKind::Rejected
    } else {
        FailureKind::Other
    };
    CommunicationError::new(op, target, kind, s)
}

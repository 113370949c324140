//! Per-pixel inversion failures.

use std::time::Duration;

use thiserror::Error;

/// Failure of a single-pixel inversion.
///
/// These never abort a batch: the dispatcher marks the cell invalid and
/// counts the failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum InversionError {
    /// The fractional signal has no physical solution (e.g. `F <= -1`).
    #[error("signal {value} cannot be inverted: {reason}")]
    InvalidSignal { value: f64, reason: String },

    /// The model did not converge to a finite column.
    #[error("model did not converge for signal {0}")]
    NonConvergence(f64),

    /// The model gave up on this pixel after its own per-call budget.
    #[error("inversion timed out after {0:?}")]
    Timeout(Duration),

    /// Any other model-side failure.
    #[error("model error: {0}")]
    Model(String),
}

impl InversionError {
    pub fn invalid_signal(value: f64, reason: impl Into<String>) -> Self {
        Self::InvalidSignal {
            value,
            reason: reason.into(),
        }
    }
}

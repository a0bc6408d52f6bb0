//! The control-loop error taxonomy.
//!
//! None of these ever leave a loop as a return value.  The loop classifies
//! each failure, updates its counters, and reports it on the status bus.
//!
//! | Variant            | Scope        | Effect                                   |
//! |--------------------|--------------|------------------------------------------|
//! | `WindowGone`       | one loop     | terminal, loop exits                     |
//! | `CaptureFailed`    | one tick     | counted toward the fault threshold       |
//! | `DetectionFailed`  | one tick     | counted toward the fault threshold       |
//! | `InjectionFailed`  | one intent   | logged, counted separately, tick goes on |
//! | `ArbiterPoisoned`  | process-wide | coordinator force-releases the gate      |

use mwp_core::WindowId;
use thiserror::Error;

use super::observe::{CaptureError, DetectionError};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("window {0} is gone")]
    WindowGone(WindowId),

    #[error("capture failed: {0}")]
    CaptureFailed(#[from] CaptureError),

    #[error("detection failed: {0}")]
    DetectionFailed(#[from] DetectionError),

    /// Every permitted strategy failed; `detail` is the outcome summary.
    #[error("injection failed ({action}): {detail}")]
    InjectionFailed { action: String, detail: String },

    #[error("pointer arbiter held by dead loop for window {0}")]
    ArbiterPoisoned(WindowId),
}

impl ControlError {
    /// Whether this failure counts toward the consecutive-failure threshold
    /// regardless of configuration.
    pub fn is_observation_failure(&self) -> bool {
        matches!(self, ControlError::CaptureFailed(_) | ControlError::DetectionFailed(_))
    }
}

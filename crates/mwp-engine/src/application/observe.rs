//! Observation ports: capture a window's pixels and ask a detector what is
//! in them.
//!
//! A control loop owns one [`Observation`] (capture + detector pair) for its
//! window.  When the loop faults it throws the pair away and asks the
//! [`ObservationFactory`] for a fresh one, which is how a stuck device
//! context or a dead detector connection gets recovered.

use async_trait::async_trait;
use mwp_core::{Detection, DetectionCriteria, WindowHandle};
use thiserror::Error;

use super::error::ControlError;

/// A captured image of one window's client area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    /// Top-down BGRA rows, `width * height * 4` bytes.  May be empty when
    /// the detector works from `image_ref` alone.
    pub pixels: Vec<u8>,
    /// Where an out-of-process detector can find this frame, if spooled.
    pub image_ref: Option<String>,
}

impl Frame {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: Vec::new(),
            image_ref: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("window has a zero-sized client area")]
    EmptyClientArea,

    #[error("capture failed: {0}")]
    Platform(String),

    #[error("failed to spool frame to {path}: {source}")]
    Spool {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("platform not supported: {0}")]
    UnsupportedPlatform(String),
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("detector unavailable: {0}")]
    Unavailable(String),

    #[error("frame has no image reference for the remote detector")]
    MissingImageRef,

    #[error("detector protocol error: {0}")]
    Protocol(String),

    #[error("detector reported: {0}")]
    Remote(String),

    #[error("detection timed out")]
    Timeout,
}

/// Produces frames of a window.
#[async_trait]
pub trait CaptureService: Send {
    async fn capture(&mut self, window: &WindowHandle) -> Result<Frame, CaptureError>;
}

/// Recognises objects in a frame.
///
/// Returns detections in the detector's own order; the loop relies on that
/// order for its nearest-target tie-break.  Filtering by label and threshold
/// is the caller's job, but a detector may use `criteria` to stop early.
#[async_trait]
pub trait DetectionService: Send {
    async fn detect(
        &mut self,
        frame: &Frame,
        criteria: &DetectionCriteria,
    ) -> Result<Vec<Detection>, DetectionError>;
}

/// The capture + detection pair a loop observes its window through.
pub struct Observation {
    pub capture: Box<dyn CaptureService>,
    pub detector: Box<dyn DetectionService>,
}

impl std::fmt::Debug for Observation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Observation")
    }
}

/// Opens observation handles for a window.
///
/// Called once when a loop starts and again after every fault backoff.
/// Either half failing to open is reported as the matching `ControlError`.
#[async_trait]
pub trait ObservationFactory: Send + Sync {
    async fn open(&self, window: &WindowHandle) -> Result<Observation, ControlError>;
}

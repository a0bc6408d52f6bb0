//! Observation factory assembled from configuration.
//!
//! Chooses the capture half (`PrintWindow`, or blank frames for dry runs)
//! and the detector half (remote service, or a simulated detector) once at
//! startup; every `open` then builds a fresh pair for one window.

use std::time::Duration;

use async_trait::async_trait;
use mwp_core::{Detection, WindowHandle};

use super::capture::mock::MockCapture;
use super::capture::spool::FrameSpool;
use super::detection::mock::ScriptedDetector;
use super::detection::remote::RemoteDetector;
use crate::application::error::ControlError;
use crate::application::observe::{
    CaptureError, CaptureService, DetectionService, Observation, ObservationFactory,
};

#[derive(Debug, Clone)]
pub enum CaptureBackend {
    /// Blank frames the size of the client area.
    Blank,
    /// `PrintWindow` capture, spooled to disk when a directory is given.
    PrintWindow { spool: Option<FrameSpool> },
}

#[derive(Debug, Clone)]
pub enum DetectorBackend {
    Remote { url: String, timeout: Duration },
    /// Sees `detection` every `every` frames; nothing when `detection` is `None`.
    Simulated { every: u64, detection: Option<Detection> },
}

#[derive(Debug, Clone)]
pub struct ConfiguredObservationFactory {
    capture: CaptureBackend,
    detector: DetectorBackend,
}

impl ConfiguredObservationFactory {
    pub fn new(capture: CaptureBackend, detector: DetectorBackend) -> Self {
        Self { capture, detector }
    }

    fn open_capture(&self) -> Result<Box<dyn CaptureService>, CaptureError> {
        match &self.capture {
            CaptureBackend::Blank => Ok(Box::new(MockCapture::new())),
            #[cfg(target_os = "windows")]
            CaptureBackend::PrintWindow { spool } => Ok(Box::new(
                super::capture::windows::PrintWindowCapture::new(spool.clone()),
            )),
            #[cfg(not(target_os = "windows"))]
            CaptureBackend::PrintWindow { .. } => Err(CaptureError::UnsupportedPlatform(
                "PrintWindow capture requires Windows".to_string(),
            )),
        }
    }
}

#[async_trait]
impl ObservationFactory for ConfiguredObservationFactory {
    async fn open(&self, _window: &WindowHandle) -> Result<Observation, ControlError> {
        let capture = self.open_capture()?;
        let detector: Box<dyn DetectionService> = match &self.detector {
            DetectorBackend::Remote { url, timeout } => Box::new(RemoteDetector::connect(url, *timeout).await?),
            DetectorBackend::Simulated { every, detection } => {
                let detector = ScriptedDetector::empty();
                Box::new(match detection {
                    Some(d) => detector.with_periodic(*every, d.clone()),
                    None => detector,
                })
            }
        };
        Ok(Observation { capture, detector })
    }
}

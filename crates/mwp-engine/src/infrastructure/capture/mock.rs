//! In-memory capture and a matching observation factory.
//!
//! [`MockCapture`] returns blank frames the size of the window's client
//! area, optionally failing its first few captures.
//! [`MockObservationFactory`] pairs one with a
//! [`ScriptedDetector`](crate::infrastructure::detection::mock::ScriptedDetector)
//! whose script is shared per window, so a test can feed detections to
//! one window's loop without touching the others.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mwp_core::{Detection, WindowHandle, WindowId};

use crate::application::error::ControlError;
use crate::application::observe::{CaptureError, CaptureService, Frame, Observation, ObservationFactory};
use crate::infrastructure::detection::mock::{DetectionScript, ScriptedDetector};

#[derive(Debug, Default)]
pub struct MockCapture {
    failures_left: u32,
    captures: u64,
}

impl MockCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `n` captures with [`CaptureError::Platform`].
    pub fn failing_first(n: u32) -> Self {
        Self { failures_left: n, captures: 0 }
    }

    pub fn captures(&self) -> u64 {
        self.captures
    }
}

#[async_trait]
impl CaptureService for MockCapture {
    async fn capture(&mut self, window: &WindowHandle) -> Result<Frame, CaptureError> {
        self.captures += 1;
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(CaptureError::Platform("scripted capture failure".to_string()));
        }
        let (w, h) = (window.client_rect.width, window.client_rect.height);
        if w == 0 || h == 0 {
            return Err(CaptureError::EmptyClientArea);
        }
        Ok(Frame::blank(w, h))
    }
}

/// Observation factory backed by [`MockCapture`] and [`ScriptedDetector`].
#[derive(Debug, Default)]
pub struct MockObservationFactory {
    scripts: Mutex<HashMap<WindowId, DetectionScript>>,
    opens: AtomicU32,
    periodic: Option<(u64, Detection)>,
}

impl MockObservationFactory {
    /// A factory whose detectors see nothing unless scripted.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every detector reports `detection` on every `every`-th empty call.
    pub fn with_periodic(mut self, every: u64, detection: Detection) -> Self {
        self.periodic = Some((every, detection));
        self
    }

    /// The detection script shared by every observation opened for `window`.
    pub fn script(&self, window: WindowId) -> DetectionScript {
        let mut scripts = self.scripts.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(scripts.entry(window).or_default())
    }

    /// Total number of observations opened so far, across all windows.
    pub fn opens(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObservationFactory for MockObservationFactory {
    async fn open(&self, window: &WindowHandle) -> Result<Observation, ControlError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let mut detector = ScriptedDetector::new(self.script(window.id));
        if let Some((every, detection)) = &self.periodic {
            detector = detector.with_periodic(*every, detection.clone());
        }
        Ok(Observation {
            capture: Box::new(MockCapture::new()),
            detector: Box::new(detector),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::detection::mock::push_result;
    use mwp_core::{DetectionCriteria, Rect};

    fn window(id: u64) -> WindowHandle {
        WindowHandle::new(WindowId(id), Rect::new(0, 0, 320, 200), "w", "w.exe")
    }

    #[tokio::test]
    async fn test_capture_fails_first_then_matches_client_size() {
        let mut capture = MockCapture::failing_first(1);

        assert!(capture.capture(&window(1)).await.is_err());
        let frame = capture.capture(&window(1)).await.unwrap();

        assert_eq!((frame.width, frame.height), (320, 200));
        assert_eq!(capture.captures(), 2);
    }

    #[tokio::test]
    async fn test_zero_sized_client_area_is_rejected() {
        let mut capture = MockCapture::new();
        let w = WindowHandle::new(WindowId(1), Rect::new(0, 0, 0, 200), "w", "w.exe");

        assert!(matches!(capture.capture(&w).await, Err(CaptureError::EmptyClientArea)));
    }

    #[tokio::test]
    async fn test_scripts_are_isolated_per_window() {
        // Arrange
        let factory = MockObservationFactory::empty();
        let hit = Detection::new("item", 0.9, Rect::new(0, 0, 2, 2));
        push_result(&factory.script(WindowId(1)), Ok(vec![hit.clone()]));
        let frame = Frame::blank(1, 1);
        let criteria = DetectionCriteria::default();

        // Act
        let mut one = factory.open(&window(1)).await.unwrap();
        let mut two = factory.open(&window(2)).await.unwrap();

        // Assert
        assert!(two.detector.detect(&frame, &criteria).await.unwrap().is_empty());
        assert_eq!(one.detector.detect(&frame, &criteria).await.unwrap(), vec![hit]);
        assert_eq!(factory.opens(), 2);
    }
}

//! Scripted detector.
//!
//! Results are popped from a shared script, so a test can push detections
//! for the *next* tick while the loop is running.  An `Err` entry makes the
//! detector fail once, which is how fault handling gets exercised.
//!
//! With [`ScriptedDetector::with_periodic`] an empty script still produces a
//! hit every N calls.  Dry runs use that to walk through the reaction path
//! without a real detector.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mwp_core::{Detection, DetectionCriteria};

use crate::application::observe::{DetectionError, DetectionService, Frame};

/// Shared queue of scripted results.  `Err` carries the failure message.
pub type DetectionScript = Arc<Mutex<VecDeque<Result<Vec<Detection>, String>>>>;

/// Pushes one scripted result.
pub fn push_result(script: &DetectionScript, result: Result<Vec<Detection>, String>) {
    script
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push_back(result);
}

#[derive(Debug, Clone)]
struct Periodic {
    every: u64,
    detection: Detection,
}

#[derive(Debug)]
pub struct ScriptedDetector {
    script: DetectionScript,
    periodic: Option<Periodic>,
    calls: u64,
}

impl ScriptedDetector {
    pub fn new(script: DetectionScript) -> Self {
        Self { script, periodic: None, calls: 0 }
    }

    /// A detector that never sees anything.
    pub fn empty() -> Self {
        Self::new(DetectionScript::default())
    }

    /// Reports `detection` on every `every`-th call that has no scripted
    /// result.  `every == 0` disables the periodic hit.
    pub fn with_periodic(mut self, every: u64, detection: Detection) -> Self {
        self.periodic = (every > 0).then_some(Periodic { every, detection });
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

#[async_trait]
impl DetectionService for ScriptedDetector {
    async fn detect(
        &mut self,
        _frame: &Frame,
        _criteria: &DetectionCriteria,
    ) -> Result<Vec<Detection>, DetectionError> {
        self.calls += 1;
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        match scripted {
            Some(Ok(detections)) => Ok(detections),
            Some(Err(message)) => Err(DetectionError::Unavailable(message)),
            None => match &self.periodic {
                Some(p) if self.calls % p.every == 0 => Ok(vec![p.detection.clone()]),
                _ => Ok(Vec::new()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mwp_core::Rect;

    fn hit() -> Detection {
        Detection::new("item", 0.9, Rect::new(10, 10, 4, 4))
    }

    #[tokio::test]
    async fn test_script_is_consumed_in_order_then_empty() {
        // Arrange
        let script = DetectionScript::default();
        push_result(&script, Ok(vec![hit()]));
        push_result(&script, Err("boom".to_string()));
        let mut detector = ScriptedDetector::new(Arc::clone(&script));
        let frame = Frame::blank(10, 10);
        let criteria = DetectionCriteria::default();

        // Act / Assert
        assert_eq!(detector.detect(&frame, &criteria).await.unwrap(), vec![hit()]);
        assert!(matches!(
            detector.detect(&frame, &criteria).await,
            Err(DetectionError::Unavailable(m)) if m == "boom"
        ));
        assert!(detector.detect(&frame, &criteria).await.unwrap().is_empty());
        assert_eq!(detector.calls(), 3);
    }

    #[tokio::test]
    async fn test_periodic_hit_fires_every_nth_call() {
        let mut detector = ScriptedDetector::empty().with_periodic(3, hit());
        let frame = Frame::blank(10, 10);
        let criteria = DetectionCriteria::default();

        let mut hits = Vec::new();
        for _ in 0..6 {
            hits.push(!detector.detect(&frame, &criteria).await.unwrap().is_empty());
        }

        assert_eq!(hits, vec![false, false, true, false, false, true]);
    }
}

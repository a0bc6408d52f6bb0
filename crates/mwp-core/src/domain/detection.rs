//! Detections reported by a recognition engine, and the nearest-target rule.

use serde::{Deserialize, Serialize};

use super::geometry::{Point, Rect};

/// One recognised object in a captured frame.
///
/// `bbox` is window-relative.  `confidence` is in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub bbox: Rect,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f32, bbox: Rect) -> Self {
        Self {
            label: label.into(),
            confidence: confidence.clamp(0.0, 1.0),
            bbox,
        }
    }

    /// Point to aim at: the center of the bounding box.
    pub fn target_point(&self) -> Point {
        self.bbox.center()
    }
}

/// What a control loop asks the detector to look for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionCriteria {
    /// Labels of interest.  Empty means every label is of interest.
    pub labels: Vec<String>,
    /// Minimum confidence for a detection to count as a positive match.
    pub threshold: f32,
    /// Stop scanning once any wanted label is found above the threshold.
    pub early_exit: bool,
}

impl DetectionCriteria {
    /// Returns `true` when `d` is a positive match under these criteria.
    pub fn is_match(&self, d: &Detection) -> bool {
        d.confidence >= self.threshold
            && (self.labels.is_empty() || self.labels.iter().any(|l| l == &d.label))
    }
}

impl Default for DetectionCriteria {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            threshold: 0.8,
            early_exit: false,
        }
    }
}

/// Index of the detection whose target point is nearest to `reference`.
///
/// Distance is Euclidean, computed exactly in integer space.  On a tie the
/// lowest index wins, so the result is deterministic for a given input.
/// Returns `None` for an empty slice.
pub fn nearest_detection(detections: &[Detection], reference: Point) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (i, d) in detections.iter().enumerate() {
        let dist = d.target_point().distance_squared(reference);
        match best {
            // Strictly-less keeps the earlier index on ties.
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((i, dist)),
        }
    }
    best.map(|(i, _)| i)
}

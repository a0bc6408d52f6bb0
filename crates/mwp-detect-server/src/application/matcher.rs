//! The recognizer port and the rules for answering a find request.
//!
//! A [`TargetMatcher`] lists every candidate it recognised in an image, in
//! its own scan order.  [`find_in`] then decides the answer for one label:
//!
//! | `early_exit` | Answer                                                  |
//! |--------------|---------------------------------------------------------|
//! | `true`       | first candidate (in scan order) matching above threshold |
//! | `false`      | highest-confidence matching candidate; first one on a tie |
//!
//! A candidate matches a label when its text contains the label, so a
//! recognizer that reports `"iron sword"` satisfies a request for `"sword"`.
//! The answer always carries the requested label, not the candidate's text.

use async_trait::async_trait;
use mwp_core::protocol::FindResult;
use mwp_core::Detection;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("request has an empty image reference")]
    EmptyImageRef,

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("no target labels requested")]
    NoLabels,

    #[error("annotation file {path} is unreadable: {reason}")]
    Annotation { path: String, reason: String },

    #[error("matcher is not ready")]
    NotReady,
}

/// Recognises candidate objects in an image.
#[async_trait]
pub trait TargetMatcher: Send + Sync {
    /// `false` while the recognizer is still loading.  Reported by `Health`.
    fn is_ready(&self) -> bool;

    /// All candidates in `image_ref`, in scan order.
    async fn candidates(&self, image_ref: &str) -> Result<Vec<Detection>, ServerError>;
}

/// The answer for one label.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOutcome {
    pub result: FindResult,
    /// Candidates examined before answering.
    pub scanned: u32,
    /// `true` when the scan stopped before the last candidate.
    pub early_exit: bool,
}

/// Looks for `label` among `candidates`.
pub fn find_in(candidates: &[Detection], label: &str, threshold: f32, early_exit: bool) -> FindOutcome {
    let mut best: Option<&Detection> = None;
    let mut scanned = 0u32;

    for candidate in candidates {
        scanned += 1;
        if !candidate.label.contains(label) {
            continue;
        }
        if early_exit && candidate.confidence >= threshold {
            return FindOutcome {
                result: found(label, candidate),
                scanned,
                early_exit: (scanned as usize) < candidates.len(),
            };
        }
        if best.map_or(true, |b| candidate.confidence > b.confidence) {
            best = Some(candidate);
        }
    }

    let result = match best {
        Some(b) if b.confidence >= threshold => found(label, b),
        Some(b) => FindResult {
            confidence: b.confidence,
            ..FindResult::not_found(label)
        },
        None => FindResult::not_found(label),
    };
    FindOutcome {
        result,
        scanned,
        early_exit: false,
    }
}

fn found(label: &str, candidate: &Detection) -> FindResult {
    FindResult {
        found: true,
        label: label.to_string(),
        confidence: candidate.confidence,
        bbox: Some(candidate.bbox),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mwp_core::Rect;

    fn candidate(label: &str, confidence: f32, x: i32) -> Detection {
        Detection::new(label, confidence, Rect::new(x, 10, 20, 20))
    }

    fn candidates() -> Vec<Detection> {
        vec![
            candidate("enemy", 0.99, 0),
            candidate("item", 0.85, 100),
            candidate("rare item", 0.97, 200),
            candidate("item", 0.4, 300),
        ]
    }

    #[test]
    fn test_early_exit_stops_at_first_match_above_threshold() {
        // Act
        let outcome = find_in(&candidates(), "item", 0.8, true);

        // Assert
        assert!(outcome.result.found);
        assert_eq!(outcome.result.bbox.map(|b| b.x), Some(100));
        assert_eq!(outcome.scanned, 2);
        assert!(outcome.early_exit);
    }

    #[test]
    fn test_full_scan_picks_best_confidence() {
        let outcome = find_in(&candidates(), "item", 0.8, false);

        assert!(outcome.result.found);
        assert_eq!(outcome.result.bbox.map(|b| b.x), Some(200));
        assert_eq!(outcome.result.label, "item");
        assert_eq!(outcome.scanned, 4);
        assert!(!outcome.early_exit);
    }

    #[test]
    fn test_full_scan_tie_keeps_first_candidate() {
        let tied = vec![candidate("item", 0.9, 1), candidate("item", 0.9, 2)];

        let outcome = find_in(&tied, "item", 0.5, false);

        assert_eq!(outcome.result.bbox.map(|b| b.x), Some(1));
    }

    #[test]
    fn test_below_threshold_reports_best_confidence_without_bbox() {
        let outcome = find_in(&candidates(), "item", 0.99, false);

        assert!(!outcome.result.found);
        assert!((outcome.result.confidence - 0.97).abs() < 1e-6);
        assert_eq!(outcome.result.bbox, None);
    }

    #[test]
    fn test_unknown_label_is_not_found_with_zero_confidence() {
        let outcome = find_in(&candidates(), "chest", 0.5, true);

        assert_eq!(outcome.result, FindResult::not_found("chest"));
        assert_eq!(outcome.scanned, 4);
        assert!(!outcome.early_exit);
    }

    #[test]
    fn test_match_on_last_candidate_is_not_an_early_exit() {
        let list = vec![candidate("enemy", 0.9, 0), candidate("item", 0.9, 50)];

        let outcome = find_in(&list, "item", 0.5, true);

        assert!(outcome.result.found);
        assert!(!outcome.early_exit);
    }
}

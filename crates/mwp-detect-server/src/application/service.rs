//! Request dispatch: one [`DetectRequest`] in, one [`DetectResponse`] out.
//!
//! Transport-free so the whole protocol can be exercised without a socket.
//! Failures never escape as `Err`; they become `DetectResponse::Error`
//! carrying the request id when one could be read.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mwp_core::protocol::{DetectRequest, DetectResponse};
use tracing::{debug, warn};

use super::matcher::{find_in, ServerError, TargetMatcher};

/// Answers detection requests with one matcher and threshold.
#[derive(Clone)]
pub struct DetectService {
    matcher: Arc<dyn TargetMatcher>,
    threshold: f32,
    started: Instant,
}

impl DetectService {
    pub fn new(matcher: Arc<dyn TargetMatcher>, threshold: f32) -> Self {
        Self {
            matcher,
            threshold,
            started: Instant::now(),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Parses one text frame and answers it.
    pub async fn handle_text(&self, text: &str) -> DetectResponse {
        match serde_json::from_str::<DetectRequest>(text) {
            Ok(request) => self.handle(request).await,
            Err(e) => {
                warn!("rejecting malformed request: {e}");
                DetectResponse::Error {
                    request_id: salvage_request_id(text),
                    message: format!("malformed request: {e}"),
                }
            }
        }
    }

    pub async fn handle(&self, request: DetectRequest) -> DetectResponse {
        match request {
            DetectRequest::Health => DetectResponse::HealthStatus {
                status: "healthy".to_string(),
                uptime_secs: self.uptime().as_secs(),
                matcher_ready: self.matcher.is_ready(),
            },

            DetectRequest::FindTarget {
                request_id,
                image_ref,
                target_label,
                early_exit,
            } => {
                let candidates = match self.load(&image_ref).await {
                    Ok(c) => c,
                    Err(e) => return error_response(request_id, &e),
                };
                let outcome = find_in(&candidates, &target_label, self.threshold, early_exit);
                debug!(
                    request_id,
                    label = %target_label,
                    found = outcome.result.found,
                    scanned = outcome.scanned,
                    "find request answered"
                );
                DetectResponse::TargetResult {
                    request_id,
                    result: outcome.result,
                    scanned: outcome.scanned,
                    early_exit: outcome.early_exit,
                }
            }

            DetectRequest::BatchFind {
                request_id,
                image_ref,
                target_labels,
                early_exit,
            } => {
                if target_labels.is_empty() {
                    return error_response(request_id, &ServerError::NoLabels);
                }
                let candidates = match self.load(&image_ref).await {
                    Ok(c) => c,
                    Err(e) => return error_response(request_id, &e),
                };
                let results = target_labels
                    .iter()
                    .map(|label| find_in(&candidates, label, self.threshold, early_exit).result)
                    .collect::<Vec<_>>();
                debug!(
                    request_id,
                    labels = target_labels.len(),
                    found = results.iter().filter(|r| r.found).count(),
                    "batch request answered"
                );
                DetectResponse::BatchResult { request_id, results }
            }
        }
    }

    async fn load(&self, image_ref: &str) -> Result<Vec<mwp_core::Detection>, ServerError> {
        if image_ref.trim().is_empty() {
            return Err(ServerError::EmptyImageRef);
        }
        if !self.matcher.is_ready() {
            return Err(ServerError::NotReady);
        }
        self.matcher.candidates(image_ref).await
    }
}

fn error_response(request_id: u64, e: &ServerError) -> DetectResponse {
    warn!(request_id, "request failed: {e}");
    DetectResponse::Error {
        request_id: Some(request_id),
        message: e.to_string(),
    }
}

/// Best-effort `request_id` from a frame that did not parse as a request.
fn salvage_request_id(text: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("request_id")?
        .as_u64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mwp_core::protocol::FindResult;
    use mwp_core::{Detection, Rect};

    /// Every image contains the same two candidates.
    struct FixedMatcher {
        ready: bool,
    }

    #[async_trait]
    impl TargetMatcher for FixedMatcher {
        fn is_ready(&self) -> bool {
            self.ready
        }

        async fn candidates(&self, image_ref: &str) -> Result<Vec<Detection>, ServerError> {
            if image_ref == "missing.bmp" {
                return Err(ServerError::ImageNotFound(image_ref.to_string()));
            }
            Ok(vec![
                Detection::new("item", 0.9, Rect::new(10, 10, 4, 4)),
                Detection::new("enemy", 0.95, Rect::new(50, 50, 8, 8)),
            ])
        }
    }

    fn service(ready: bool) -> DetectService {
        DetectService::new(Arc::new(FixedMatcher { ready }), 0.8)
    }

    #[tokio::test]
    async fn test_health_reports_matcher_readiness() {
        let resp = service(false).handle(DetectRequest::Health).await;

        match resp {
            DetectResponse::HealthStatus { status, matcher_ready, .. } => {
                assert_eq!(status, "healthy");
                assert!(!matcher_ready);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_find_target_answers_with_request_id() {
        // Arrange
        let req = DetectRequest::FindTarget {
            request_id: 9,
            image_ref: "frame.bmp".to_string(),
            target_label: "enemy".to_string(),
            early_exit: true,
        };

        // Act
        let resp = service(true).handle(req).await;

        // Assert
        match resp {
            DetectResponse::TargetResult { request_id, result, scanned, early_exit } => {
                assert_eq!(request_id, 9);
                assert!(result.found);
                assert_eq!(result.bbox, Some(Rect::new(50, 50, 8, 8)));
                assert_eq!(scanned, 2);
                assert!(!early_exit);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_returns_one_result_per_label_in_order() {
        let req = DetectRequest::BatchFind {
            request_id: 2,
            image_ref: "frame.bmp".to_string(),
            target_labels: vec!["chest".to_string(), "item".to_string()],
            early_exit: false,
        };

        let resp = service(true).handle(req).await;

        match resp {
            DetectResponse::BatchResult { request_id, results } => {
                assert_eq!(request_id, 2);
                assert_eq!(results.len(), 2);
                assert_eq!(results[0], FindResult::not_found("chest"));
                assert!(results[1].found);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_batch_without_labels_is_an_error() {
        let req = DetectRequest::BatchFind {
            request_id: 4,
            image_ref: "frame.bmp".to_string(),
            target_labels: vec![],
            early_exit: true,
        };

        let resp = service(true).handle(req).await;

        assert!(matches!(resp, DetectResponse::Error { request_id: Some(4), .. }));
    }

    #[tokio::test]
    async fn test_missing_image_and_unready_matcher_are_errors() {
        let missing = DetectRequest::FindTarget {
            request_id: 5,
            image_ref: "missing.bmp".to_string(),
            target_label: "item".to_string(),
            early_exit: true,
        };
        let resp = service(true).handle(missing.clone()).await;
        assert!(matches!(resp, DetectResponse::Error { request_id: Some(5), .. }));

        let resp = service(false).handle(missing).await;
        match resp {
            DetectResponse::Error { message, .. } => assert!(message.contains("not ready")),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_text_keeps_request_id_when_readable() {
        let resp = service(true)
            .handle_text(r#"{"type":"FindTarget","request_id":12}"#)
            .await;
        assert!(matches!(resp, DetectResponse::Error { request_id: Some(12), .. }));

        let resp = service(true).handle_text("not json").await;
        assert!(matches!(resp, DetectResponse::Error { request_id: None, .. }));
    }
}

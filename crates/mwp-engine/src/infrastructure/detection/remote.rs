//! WebSocket client for the standalone detection service.
//!
//! # Protocol (for beginners)
//!
//! `mwp-detect-server` speaks one JSON object per WebSocket *text* frame (see
//! `mwp_core::protocol::detection`).  For every `detect` call this client:
//!
//! 1. Sends `FindTarget` (one label) or `BatchFind` (several labels) with a
//!    fresh `request_id` and the frame's spooled file path as `image_ref`.
//! 2. Reads frames until the response carrying the same `request_id`
//!    arrives.  Answers to earlier requests that timed out are skipped, as
//!    are WebSocket ping/pong frames.
//! 3. Converts every `found` result with a bounding box into a
//!    [`Detection`], keeping the server's order.
//!
//! The whole exchange is bounded by one timeout.  A closed socket is
//! reported as [`DetectionError::Unavailable`]; the control loop counts that
//! as a failure and, after enough of them, reconnects through its
//! observation factory.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use mwp_core::protocol::detection::{DetectRequest, DetectResponse, FindResult};
use mwp_core::{Detection, DetectionCriteria};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use crate::application::observe::{DetectionError, DetectionService, Frame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// [`DetectionService`] backed by a remote `mwp-detect-server`.
pub struct RemoteDetector {
    stream: WsStream,
    timeout: Duration,
    next_request_id: u64,
}

impl RemoteDetector {
    /// Opens the WebSocket connection.
    ///
    /// # Errors
    ///
    /// [`DetectionError::Unavailable`] if the handshake fails or does not
    /// finish within `timeout`.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, DetectionError> {
        let (stream, _response) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| DetectionError::Unavailable(format!("connecting to {url} timed out")))?
            .map_err(|e| DetectionError::Unavailable(format!("connecting to {url}: {e}")))?;
        debug!(%url, "connected to detection service");
        Ok(Self {
            stream,
            timeout,
            next_request_id: 1,
        })
    }

    async fn exchange(&mut self, request: &DetectRequest, request_id: u64) -> Result<Vec<FindResult>, DetectionError> {
        let text = serde_json::to_string(request).map_err(|e| DetectionError::Protocol(e.to_string()))?;
        self.stream
            .send(WsMessage::Text(text))
            .await
            .map_err(|e| DetectionError::Unavailable(e.to_string()))?;

        let deadline = Instant::now() + self.timeout;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.stream.next())
                .await
                .map_err(|_| DetectionError::Timeout)?;
            let text = match frame {
                Some(Ok(WsMessage::Text(text))) => text,
                Some(Ok(WsMessage::Close(_))) | None => {
                    return Err(DetectionError::Unavailable("connection closed".to_string()));
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(DetectionError::Unavailable(e.to_string())),
            };
            let response: DetectResponse =
                serde_json::from_str(&text).map_err(|e| DetectionError::Protocol(e.to_string()))?;
            match results_for(response, request_id) {
                Some(outcome) => return outcome,
                None => trace!(request_id, "skipping unrelated response"),
            }
        }
    }
}

/// Extracts the results of `request_id` from one response.
///
/// Returns `None` when the response answers a different request.
fn results_for(response: DetectResponse, request_id: u64) -> Option<Result<Vec<FindResult>, DetectionError>> {
    match response {
        DetectResponse::TargetResult { request_id: id, result, .. } if id == request_id => Some(Ok(vec![result])),
        DetectResponse::BatchResult { request_id: id, results } if id == request_id => Some(Ok(results)),
        DetectResponse::Error { request_id: Some(id), message } if id == request_id => {
            Some(Err(DetectionError::Remote(message)))
        }
        DetectResponse::Error { request_id: None, message } => Some(Err(DetectionError::Remote(message))),
        _ => None,
    }
}

fn to_detections(results: Vec<FindResult>) -> Vec<Detection> {
    results
        .into_iter()
        .filter(|r| r.found)
        .filter_map(|r| r.bbox.map(|bbox| Detection::new(r.label, r.confidence, bbox)))
        .collect()
}

#[async_trait]
impl DetectionService for RemoteDetector {
    async fn detect(&mut self, frame: &Frame, criteria: &DetectionCriteria) -> Result<Vec<Detection>, DetectionError> {
        let image_ref = frame.image_ref.clone().ok_or(DetectionError::MissingImageRef)?;
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = match criteria.labels.as_slice() {
            [] => {
                return Err(DetectionError::Protocol(
                    "remote detection needs at least one target label".to_string(),
                ))
            }
            [label] => DetectRequest::FindTarget {
                request_id,
                image_ref,
                target_label: label.clone(),
                early_exit: criteria.early_exit,
            },
            labels => DetectRequest::BatchFind {
                request_id,
                image_ref,
                target_labels: labels.to_vec(),
                early_exit: criteria.early_exit,
            },
        };

        let results = self.exchange(&request, request_id).await?;
        Ok(to_detections(results))
    }
}

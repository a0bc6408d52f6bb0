//! JSON message types for the standalone detection service.
//!
//! The engine can delegate recognition to a separate `mwp-detect-server`
//! process.  Both sides exchange one JSON object per WebSocket text frame.
//!
//! # JSON discriminant
//!
//! Every message is a JSON object with a `"type"` field that identifies the
//! variant.  All other fields are flattened into the same object:
//!
//! ```json
//! {"type":"FindTarget","request_id":7,"image_ref":"C:/spool/0x1A2B.bmp","target_label":"item","early_exit":true}
//! ```
//!
//! Requests and responses are separate enums so a response can never be
//! sent in the request direction by mistake.

use serde::{Deserialize, Serialize};

use crate::domain::geometry::Rect;

fn default_true() -> bool {
    true
}

// ── Engine → Server ───────────────────────────────────────────────────────────

/// Messages the engine sends to the detection service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DetectRequest {
    /// Liveness probe.
    Health,

    /// Looks for one label in one image.
    FindTarget {
        request_id: u64,
        /// Path (or other locator) of an image the server can open.
        image_ref: String,
        target_label: String,
        /// Stop at the first match above threshold instead of scanning the
        /// whole frame for the best one.
        #[serde(default = "default_true")]
        early_exit: bool,
    },

    /// Looks for several labels in one image; one result per label.
    BatchFind {
        request_id: u64,
        image_ref: String,
        target_labels: Vec<String>,
        #[serde(default = "default_true")]
        early_exit: bool,
    },
}

// ── Server → Engine ───────────────────────────────────────────────────────────

/// Result of looking for one label.
///
/// When `found` is `false`, `confidence` is the best score seen (possibly
/// `0.0`) and `bbox` is `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindResult {
    pub found: bool,
    pub label: String,
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Rect>,
}

impl FindResult {
    pub fn not_found(label: impl Into<String>) -> Self {
        Self {
            found: false,
            label: label.into(),
            confidence: 0.0,
            bbox: None,
        }
    }
}

/// Messages the detection service sends back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DetectResponse {
    HealthStatus {
        status: String,
        uptime_secs: u64,
        matcher_ready: bool,
    },

    TargetResult {
        request_id: u64,
        result: FindResult,
        /// How many candidates were examined before answering.
        scanned: u32,
        /// `true` when scanning stopped early on a match.
        early_exit: bool,
    },

    BatchResult {
        request_id: u64,
        results: Vec<FindResult>,
    },

    /// The request could not be served.
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        message: String,
    },
}

//! mwp-detect-server library crate.
//!
//! A small standalone service the engine can hand recognition off to.  The
//! engine spools each captured frame to disk and sends the path; the server
//! answers whether a labelled target is in that image and where.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! mwp-engine (JSON over WebSocket)
//!         ↕
//! [mwp-detect-server]
//!   ├── domain/            ServerConfig
//!   ├── application/       TargetMatcher port, find / batch-find rules,
//!   │                      request → response dispatch
//!   └── infrastructure/
//!         ├── ws_server/   WebSocket accept loop (tokio-tungstenite)
//!         └── annotations/ Matcher reading `<image>.detections.json` files
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `mwp-core` only; recognition itself
//!   sits behind the [`application::TargetMatcher`] trait.
//! - `infrastructure` owns sockets and the file system.
//!
//! # For beginners: why is recognition behind a trait?
//!
//! The actual recognizer (template matching, OCR, a neural network) is a big
//! external dependency that changes independently of the protocol.  Keeping
//! the early-exit and best-match rules in the application layer means they
//! are tested once against an in-memory matcher, and any recognizer that can
//! list candidate detections for an image plugs in unchanged.

/// Domain layer: configuration values.
pub mod domain;

/// Application layer: matching rules and request dispatch.
pub mod application;

/// Infrastructure layer: WebSocket server and the annotation-file matcher.
pub mod infrastructure;

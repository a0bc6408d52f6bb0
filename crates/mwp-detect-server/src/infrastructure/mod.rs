//! Infrastructure layer for mwp-detect-server: sockets and files.
//!
//! - `ws_server` binds the listener, upgrades connections to WebSocket and
//!   answers one response frame per request frame.
//! - `annotations` is the shipped [`crate::application::TargetMatcher`]: it
//!   reads detections an external recognizer wrote next to each image.

pub mod annotations;
pub mod ws_server;

pub use annotations::AnnotationMatcher;
pub use ws_server::{run_server, serve};

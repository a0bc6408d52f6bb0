//! # mwp-core
//!
//! Shared library for MultiWindow Pilot containing the domain entities, key
//! code tables, and the JSON protocol spoken with the standalone detection
//! service.
//!
//! This crate is used by both the engine and the detection server.
//! It has zero dependencies on OS APIs, async runtimes, or network sockets.
//!
//! # Architecture overview
//!
//! MultiWindow Pilot drives several desktop application windows at once
//! without raising any of them.  Each window gets its own control loop that
//! captures the window, asks a detector what is on screen, and answers with
//! synthetic input aimed at that window only.
//!
//! This crate is the shared foundation.  It defines:
//!
//! - **`domain`** – Pure values with no OS dependencies: geometry, window
//!   identity and selection criteria, injection intents and their expansion
//!   into primitive input steps, injection outcomes, and detections with the
//!   nearest-target selection rule.
//!
//! - **`keymap`** – USB HID Usage IDs as the canonical key representation,
//!   configuration key names, and the Windows Virtual Key table used by the
//!   injection strategies.
//!
//! - **`protocol`** – The `"type"`-tagged JSON request/response messages of
//!   the detection service (health check, find-target, batch-find).

pub mod domain;
pub mod keymap;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `mwp_core::WindowHandle` instead of `mwp_core::domain::window::WindowHandle`.
pub use domain::detection::{nearest_detection, Detection, DetectionCriteria};
pub use domain::geometry::{FractionalRect, GeometryError, Point, Rect};
pub use domain::intent::{pending_releases, InjectionIntent, InputStep, IntentAction, MouseButton};
pub use domain::outcome::{InjectionOutcome, StrategyAttempt, StrategyKind};
pub use domain::window::{WindowCriteria, WindowHandle, WindowId};
pub use keymap::hid::HidKeyCode;

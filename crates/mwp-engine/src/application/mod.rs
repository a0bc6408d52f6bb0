//! Application layer of the engine.
//!
//! # What lives here? (for beginners)
//!
//! The application layer orchestrates the domain values from `mwp_core` into
//! the running system.  It depends only on traits (ports) for everything
//! that touches the OS: window enumeration, injection methods, capture and
//! detection.  The concrete adapters live in `infrastructure`.
//!
//! # Sub-modules
//!
//! - **`window_registry`** – Port for enumerating target windows and
//!   resolving their current client rectangle.
//!
//! - **`inject`** – The injection strategy chain: tries each delivery method
//!   in order and stops at the first one that works.
//!
//! - **`arbiter`** – The process-wide gate around the real pointer, used by
//!   the one strategy that moves the physical cursor.
//!
//! - **`observe`** – Ports for capturing a window and detecting objects in
//!   the captured frame.
//!
//! - **`cadence`** / **`combat`** – Pausable timers and the movement and
//!   attack planners behind the baseline cadence.
//!
//! - **`control_loop`** – The per-window state machine.  This is the heart of
//!   the engine; one instance runs per target window.
//!
//! - **`coordinator`** – Spawns, reaps and stops control loops as windows come
//!   and go.
//!
//! - **`status`** / **`error`** – The status event bus and the loop error
//!   taxonomy.

pub mod arbiter;
pub mod cadence;
pub mod combat;
pub mod control_loop;
pub mod coordinator;
pub mod error;
pub mod inject;
pub mod observe;
pub mod status;
pub mod window_registry;

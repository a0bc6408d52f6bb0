//! Domain layer: pure values shared by the engine and the detection server.
//!
//! Nothing in here touches the OS.  Every type is plain data with
//! constructors that enforce its invariants, so the application layer can
//! pass them around without re-validating.
//!
//! # Sub-modules
//!
//! - **`geometry`** – `Point`, `Rect`, and `FractionalRect` (a sub-area
//!   expressed as fractions of a window's size).
//! - **`window`** – `WindowId`, `WindowHandle`, and the `WindowCriteria`
//!   used to pick which top-level windows get a control loop.
//! - **`intent`** – `InjectionIntent`, the immutable description of one
//!   input event, and `InputStep`, its primitive expansion.
//! - **`outcome`** – `StrategyKind` and `InjectionOutcome`, the record of
//!   which delivery method (if any) succeeded.
//! - **`detection`** – `Detection`, `DetectionCriteria`, and
//!   `nearest_detection`.

pub mod detection;
pub mod geometry;
pub mod intent;
pub mod outcome;
pub mod window;

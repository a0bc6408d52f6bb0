//! Infrastructure layer of the engine.
//!
//! Contains OS-facing adapters: window enumeration, the five injection
//! strategies, window capture, detector clients, the stop hotkey, and
//! configuration storage.
//! Every port also has an in-memory implementation that is always compiled,
//! so tests and `--dry-run` work on any platform.
//!
//! **Dependency rule**: this layer may depend on `application` and `mwp_core`,
//! but MUST NOT be imported by the `application` layer outside of tests.

pub mod capture;
pub mod detection;
pub mod hotkey;
pub mod injection;
pub mod observation;
pub mod storage;
pub mod window_registry;

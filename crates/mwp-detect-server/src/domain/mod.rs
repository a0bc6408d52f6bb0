//! Domain layer for mwp-detect-server.
//!
//! Only plain configuration lives here; the detection types themselves are
//! shared with the engine through `mwp-core`.

pub mod config;

pub use config::ServerConfig;

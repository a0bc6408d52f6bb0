//! Application layer: what a find request means, independent of transport
//! and of how candidates are recognised.

pub mod matcher;
pub mod service;

pub use matcher::{find_in, FindOutcome, ServerError, TargetMatcher};
pub use service::DetectService;

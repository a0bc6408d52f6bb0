//! Wire protocol shared by the engine and the detection server.

pub mod detection;

pub use detection::{DetectRequest, DetectResponse, FindResult};

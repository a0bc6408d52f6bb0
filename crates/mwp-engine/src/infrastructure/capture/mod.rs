//! Window capture adapters.
//!
//! | Module    | OS      | Notes                                                        |
//! |-----------|---------|--------------------------------------------------------------|
//! | `windows` | Windows | `PrintWindow(PW_RENDERFULLCONTENT)` into a DIB, works occluded |
//! | `mock`    | any     | blank frames, scriptable failures, and a test observation factory |
//! | `spool`   | any     | writes frames to BMP files for out-of-process detectors      |

pub mod mock;
pub mod spool;

#[cfg(target_os = "windows")]
pub mod windows;

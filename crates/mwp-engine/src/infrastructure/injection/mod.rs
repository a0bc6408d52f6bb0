//! Injection strategy adapters.
//!
//! The five Win32 strategies live in `windows` and are only compiled on
//! Windows.  `messages` (step → window-message translation) and `mock`
//! (scriptable strategies with an attempt log) are always compiled, so the
//! translation is tested everywhere and dry runs work on any platform.

pub mod messages;
pub mod mock;

#[cfg(target_os = "windows")]
pub mod windows;

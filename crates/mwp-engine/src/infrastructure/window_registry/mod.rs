//! Window registry adapters.
//!
//! | Module      | OS      | API used                                                   |
//! |-------------|---------|------------------------------------------------------------|
//! | `windows`   | Windows | `EnumWindows`, `GetWindowTextW`, `QueryFullProcessImageNameW`, `GetClientRect` + `ClientToScreen` |
//! | `simulated` | any     | in-memory table, windows opened/closed by the caller       |
//!
//! The simulated registry is always compiled (not guarded by `#[cfg]`) so
//! tests and dry runs work on any platform.

pub mod simulated;

#[cfg(target_os = "windows")]
pub mod windows;

/// Re-export the Win32 registry as `NativeWindowRegistry` on Windows.
#[cfg(target_os = "windows")]
pub use windows::WindowsWindowRegistry as NativeWindowRegistry;

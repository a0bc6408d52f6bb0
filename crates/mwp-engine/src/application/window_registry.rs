//! Window Registry port: enumerate target windows and resolve their current
//! client rectangle.
//!
//! The registry never caches.  Windows open and close between calls, so
//! every `enumerate` re-scans the desktop and every `resolve` asks the OS
//! again.  A `NotFound` from `resolve` is terminal for that window's control
//! loop: the window is gone and its identity will not come back.

use mwp_core::{Rect, WindowHandle, WindowId};
use thiserror::Error;

/// Error type for window registry operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The handle has gone stale.  Callers must not retry.
    #[error("window {0} no longer exists")]
    NotFound(WindowId),

    /// The OS enumeration call itself failed.
    #[error("platform error while enumerating windows: {0}")]
    Platform(String),
}

/// Enumerates and resolves top-level windows matching the configured
/// selection criteria.
///
/// Implementations: `WindowsWindowRegistry` (Win32) and
/// `SimulatedWindowRegistry` (in-memory, for tests and dry runs).
#[cfg_attr(test, mockall::automock)]
pub trait WindowRegistry: Send + Sync {
    /// Re-scans the desktop and returns every matching window.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Platform`] if the OS enumeration fails.
    fn enumerate(&self) -> Result<Vec<WindowHandle>, RegistryError>;

    /// Returns the window's current client rectangle in screen coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] when the window has closed.
    fn resolve(&self, id: WindowId) -> Result<Rect, RegistryError>;
}

//! In-memory window registry.
//!
//! Windows are "opened" and "closed" by the caller, which makes window
//! lifecycles scriptable in tests.  The dry-run binary seeds it from the
//! `[simulation]` section of the configuration file.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use mwp_core::{Rect, WindowCriteria, WindowHandle, WindowId};

use crate::application::window_registry::{RegistryError, WindowRegistry};

/// A registry backed by a `BTreeMap`, so enumeration order is by window id.
#[derive(Debug, Default)]
pub struct SimulatedWindowRegistry {
    windows: Mutex<BTreeMap<WindowId, WindowHandle>>,
    criteria: Option<WindowCriteria>,
}

impl SimulatedWindowRegistry {
    /// A registry that reports every open window.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry that filters its windows through `criteria`, like the
    /// native one does.
    pub fn with_criteria(criteria: WindowCriteria) -> Self {
        Self {
            windows: Mutex::default(),
            criteria: Some(criteria),
        }
    }

    /// Adds or replaces a window.
    pub fn open(&self, window: WindowHandle) {
        self.lock().insert(window.id, window);
    }

    /// Removes a window.  Returns `false` if it was not open.
    pub fn close(&self, id: WindowId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Moves or resizes an open window.
    pub fn move_to(&self, id: WindowId, client_rect: Rect) -> bool {
        match self.lock().get_mut(&id) {
            Some(w) => {
                w.client_rect = client_rect;
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<WindowId, WindowHandle>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WindowRegistry for SimulatedWindowRegistry {
    fn enumerate(&self) -> Result<Vec<WindowHandle>, RegistryError> {
        Ok(self
            .lock()
            .values()
            .filter(|w| match &self.criteria {
                Some(c) => c.matches(&w.title, &w.process_name, w.client_rect.width, w.client_rect.height),
                None => true,
            })
            .cloned()
            .collect())
    }

    fn resolve(&self, id: WindowId) -> Result<Rect, RegistryError> {
        self.lock()
            .get(&id)
            .map(|w| w.client_rect)
            .ok_or(RegistryError::NotFound(id))
    }
}

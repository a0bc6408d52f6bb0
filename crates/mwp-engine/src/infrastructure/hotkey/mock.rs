//! In-memory keyboard state.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use super::KeyStateReader;

/// Keys are down between [`press`](Self::press) and
/// [`release`](Self::release).  Dry runs use an untouched instance, so the
/// stop hotkey there never fires.
#[derive(Debug, Default)]
pub struct SimulatedKeyboard {
    down: Mutex<HashSet<u8>>,
}

impl SimulatedKeyboard {
    pub fn press(&self, vk: u8) {
        self.down.lock().unwrap_or_else(PoisonError::into_inner).insert(vk);
    }

    pub fn release(&self, vk: u8) {
        self.down.lock().unwrap_or_else(PoisonError::into_inner).remove(&vk);
    }
}

impl KeyStateReader for SimulatedKeyboard {
    fn is_down(&self, vk: u8) -> bool {
        self.down.lock().unwrap_or_else(PoisonError::into_inner).contains(&vk)
    }
}

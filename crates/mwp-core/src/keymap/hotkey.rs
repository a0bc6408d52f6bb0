//! Key chords such as `"ctrl+q"`, used for the global stop hotkey.
//!
//! A [`Hotkey`] is a set of keys that must all be held at once.  Parsing is
//! OS-free; the engine's hotkey watcher samples the keyboard and feeds a
//! [`ChordLatch`] with "is every key of the chord down right now?".

use std::fmt;

use thiserror::Error;

use super::hid::{HidKeyCode, UnknownKeyName};
use super::windows_vk::{generic_modifier_vk, hid_to_vk};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HotkeyError {
    #[error("hotkey is empty")]
    Empty,

    #[error(transparent)]
    UnknownKey(#[from] UnknownKeyName),

    #[error("hotkey {0:?} has no non-modifier key")]
    ModifiersOnly(String),

    #[error("key {0:?} appears twice in the hotkey")]
    Repeated(String),
}

/// A chord of one or more modifiers plus at least one ordinary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hotkey {
    keys: Vec<HidKeyCode>,
}

impl Hotkey {
    /// Parses `+`-separated key names (`"ctrl+q"`, `"Ctrl + Shift + F12"`).
    ///
    /// # Errors
    ///
    /// [`HotkeyError`] for empty input, unknown names, a chord made only of
    /// modifiers, or a key listed twice.
    pub fn parse(text: &str) -> Result<Self, HotkeyError> {
        if text.trim().is_empty() {
            return Err(HotkeyError::Empty);
        }
        let mut keys = Vec::new();
        for name in text.split('+') {
            let key = HidKeyCode::from_name(name)?;
            if keys.contains(&key) {
                return Err(HotkeyError::Repeated(name.trim().to_string()));
            }
            keys.push(key);
        }
        if keys.iter().all(|k| k.is_modifier()) {
            return Err(HotkeyError::ModifiersOnly(text.trim().to_string()));
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[HidKeyCode] {
        &self.keys
    }

    /// Virtual Key codes to sample.  Modifiers use their side-less code so
    /// either Ctrl (or Shift, Alt) satisfies the chord.
    pub fn vk_codes(&self) -> Vec<u8> {
        self.keys
            .iter()
            .filter_map(|&k| hid_to_vk(k))
            .map(generic_modifier_vk)
            .collect()
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.keys.iter().map(|k| format!("{k:?}")).collect();
        f.write_str(&names.join("+"))
    }
}

/// Edge detector over chord samples.
///
/// Fires once when the chord becomes fully held and re-arms only after it
/// has been released, so holding the keys never fires twice.
#[derive(Debug, Default, Clone)]
pub struct ChordLatch {
    held: bool,
}

impl ChordLatch {
    /// Feeds one sample; returns `true` on the press edge.
    pub fn update(&mut self, all_down: bool) -> bool {
        let fired = all_down && !self.held;
        self.held = all_down;
        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ctrl_q() {
        let hotkey = Hotkey::parse("ctrl+q").unwrap();

        assert_eq!(hotkey.keys(), &[HidKeyCode::ControlLeft, HidKeyCode::KeyQ]);
        assert_eq!(hotkey.vk_codes(), vec![0x11, 0x51]);
        assert_eq!(hotkey.to_string(), "ControlLeft+KeyQ");
    }

    #[test]
    fn test_parse_tolerates_spaces_and_case() {
        let hotkey = Hotkey::parse(" Ctrl + Shift + F12 ").unwrap();

        assert_eq!(
            hotkey.keys(),
            &[HidKeyCode::ControlLeft, HidKeyCode::ShiftLeft, HidKeyCode::F12]
        );
    }

    #[test]
    fn test_parse_rejects_bad_chords() {
        assert_eq!(Hotkey::parse("  "), Err(HotkeyError::Empty));
        assert_eq!(Hotkey::parse("ctrl+shift"), Err(HotkeyError::ModifiersOnly("ctrl+shift".to_string())));
        assert_eq!(Hotkey::parse("q+q"), Err(HotkeyError::Repeated("q".to_string())));
        assert!(matches!(Hotkey::parse("ctrl+nope"), Err(HotkeyError::UnknownKey(_))));
    }

    #[test]
    fn test_latch_fires_once_per_press() {
        let mut latch = ChordLatch::default();

        let fired: Vec<bool> = [false, true, true, true, false, true]
            .into_iter()
            .map(|down| latch.update(down))
            .collect();

        assert_eq!(fired, vec![false, true, false, false, false, true]);
    }
}
